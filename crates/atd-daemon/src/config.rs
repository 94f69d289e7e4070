//! Daemon configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults, an
//! optional JSON file, then command-line flags and environment variables
//! ([`ConfigOverrides`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use atd_rtc::{DEFAULT_RTC_DEVICE, HardwareProfile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtdError, ConfigError};
use crate::logging::LogBackend;

/// Complete daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Hardware quirk profile.
    pub profile: HardwareProfile,
    /// Kernel RTC device, used by every profile except `no-rtc`.
    pub rtc_device: PathBuf,
    /// Register pseudo-file holding the clock counter, required by `no-rtc`.
    pub register_file: Option<PathBuf>,
    /// Upper bound on one wait, in seconds. Defaults per profile.
    pub max_sleep_secs: Option<u64>,
    /// Where log output goes.
    pub log_backend: LogBackend,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            profile: HardwareProfile::default(),
            rtc_device: PathBuf::from(DEFAULT_RTC_DEVICE),
            register_file: None,
            max_sleep_secs: None,
            log_backend: LogBackend::default(),
        }
    }
}

impl DaemonConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Check settings that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero `max_sleep_secs` or a
    /// `no-rtc` profile without a register file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sleep_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "max_sleep_secs must be at least 1".to_string(),
            ));
        }
        if self.profile == HardwareProfile::NoRtc && self.register_file.is_none() {
            return Err(ConfigError::Invalid(
                "the no-rtc profile needs a register_file to keep time in".to_string(),
            ));
        }
        Ok(())
    }

    /// Longest single wait.
    #[must_use]
    pub fn max_sleep(&self) -> Duration {
        self.max_sleep_secs
            .map_or_else(|| self.profile.default_max_sleep(), Duration::from_secs)
    }

    /// Anchor the device and register paths to the current directory, so
    /// they survive the daemon's `chdir` into the spool.
    ///
    /// # Errors
    ///
    /// Returns [`AtdError::ResourceInit`] if the working directory cannot be
    /// determined.
    pub fn with_absolute_paths(mut self) -> Result<Self, AtdError> {
        self.rtc_device = absolute(&self.rtc_device)?;
        if let Some(path) = self.register_file.take() {
            self.register_file = Some(absolute(&path)?);
        }
        Ok(self)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, AtdError> {
    std::path::absolute(path).map_err(|source| AtdError::ResourceInit {
        operation: "resolve path",
        path: path.to_path_buf(),
        source,
    })
}

/// Settings given on the command line or in the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--profile` / `ATD_PROFILE`.
    pub profile: Option<HardwareProfile>,
    /// `--rtc-device`.
    pub rtc_device: Option<PathBuf>,
    /// `--register-file`.
    pub register_file: Option<PathBuf>,
    /// `--max-sleep-secs`.
    pub max_sleep_secs: Option<u64>,
    /// `--syslog`.
    pub syslog: bool,
}

impl ConfigOverrides {
    /// Apply every override that was given.
    pub fn apply(self, config: &mut DaemonConfig) {
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        if let Some(rtc_device) = self.rtc_device {
            config.rtc_device = rtc_device;
        }
        if let Some(register_file) = self.register_file {
            config.register_file = Some(register_file);
        }
        if let Some(secs) = self.max_sleep_secs {
            config.max_sleep_secs = Some(secs);
        }
        if self.syslog {
            config.log_backend = LogBackend::Syslog;
        }
    }
}

/// Build the effective configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be loaded or the result does
/// not validate.
pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<DaemonConfig, ConfigError> {
    let mut config = match file {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.profile, HardwareProfile::Standard);
        assert_eq!(config.rtc_device, PathBuf::from("/dev/rtc"));
        assert_eq!(config.max_sleep(), Duration::from_secs(600));
        assert_eq!(config.log_backend, LogBackend::Stderr);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_sleep_follows_profile() {
        let mut config = DaemonConfig {
            profile: HardwareProfile::BuggySelect,
            ..DaemonConfig::default()
        };
        assert_eq!(config.max_sleep(), Duration::from_secs(30));
        config.max_sleep_secs = Some(5);
        assert_eq!(config.max_sleep(), Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        let config = DaemonConfig {
            max_sleep_secs: Some(0),
            ..DaemonConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DaemonConfig {
            profile: HardwareProfile::NoRtc,
            ..DaemonConfig::default()
        };
        assert!(config.validate().is_err());
        config.register_file = Some(PathBuf::from("/sys/devices/platform/rtc/counter"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("atd.json");
        fs::write(&path, r#"{ "profile": "same-day-alarm-only", "log_backend": "syslog" }"#)?;

        let config = DaemonConfig::from_file(&path)?;
        assert_eq!(config.profile, HardwareProfile::SameDayAlarmOnly);
        assert_eq!(config.log_backend, LogBackend::Syslog);
        assert_eq!(config.rtc_device, PathBuf::from(DEFAULT_RTC_DEVICE));
        Ok(())
    }

    #[test]
    fn test_unknown_keys_rejected() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("atd.json");
        fs::write(&path, r#"{ "profil": "standard" }"#)?;
        assert!(matches!(
            DaemonConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = DaemonConfig::from_file(Path::new("/nonexistent/atd.json"));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_overrides_win() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("atd.json");
        fs::write(&path, r#"{ "profile": "standard", "max_sleep_secs": 120 }"#)?;

        let overrides = ConfigOverrides {
            profile: Some(HardwareProfile::NoRtc),
            register_file: Some(PathBuf::from("/tmp/counter")),
            syslog: true,
            ..ConfigOverrides::default()
        };
        let config = resolve(Some(&path), overrides)?;
        assert_eq!(config.profile, HardwareProfile::NoRtc);
        assert_eq!(config.max_sleep(), Duration::from_secs(120));
        assert_eq!(config.log_backend, LogBackend::Syslog);
        Ok(())
    }

    #[test]
    fn test_paths_made_absolute() -> TestResult {
        let cwd = std::env::current_dir()?;
        let config = DaemonConfig {
            rtc_device: PathBuf::from("rtc0"),
            register_file: Some(PathBuf::from("regs/clock")),
            ..DaemonConfig::default()
        }
        .with_absolute_paths()?;
        assert_eq!(config.rtc_device, cwd.join("rtc0"));
        assert_eq!(config.register_file, Some(cwd.join("regs/clock")));

        let config = DaemonConfig::default().with_absolute_paths()?;
        assert_eq!(config.rtc_device, PathBuf::from("/dev/rtc"));
        assert_eq!(config.register_file, None);
        Ok(())
    }

    #[test]
    fn test_resolve_validates() {
        let overrides = ConfigOverrides {
            max_sleep_secs: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(resolve(None, overrides).is_err());
    }
}
