//! Clock selection from configuration.

use atd_rtc::{HardwareProfile, RegisterFileRtc, RtcClock};
use tracing::info;

use crate::config::DaemonConfig;
use crate::error::{AtdError, ConfigError};

/// Open the clock the configured profile calls for.
///
/// `no-rtc` boards keep time in a register pseudo-file; every other profile
/// talks to the kernel RTC device.
///
/// # Errors
///
/// Returns [`AtdError::Hardware`] if the device or register file cannot be
/// opened, or [`AtdError::Config`] if `no-rtc` has no register file.
pub fn open_clock(config: &DaemonConfig) -> Result<Box<dyn RtcClock>, AtdError> {
    match config.profile {
        HardwareProfile::NoRtc => {
            let path = config.register_file.as_ref().ok_or_else(|| {
                ConfigError::Invalid("the no-rtc profile needs a register_file".to_string())
            })?;
            let clock = RegisterFileRtc::open(path)?;
            info!(register = %path.display(), "using register file clock");
            Ok(Box::new(clock))
        }
        profile => open_device(config, profile),
    }
}

#[cfg(target_os = "linux")]
fn open_device(config: &DaemonConfig, profile: HardwareProfile) -> Result<Box<dyn RtcClock>, AtdError> {
    let clock = atd_rtc::LinuxRtc::open(&config.rtc_device, profile)?;
    info!(device = %config.rtc_device.display(), %profile, "using kernel RTC");
    Ok(Box::new(clock))
}

#[cfg(not(target_os = "linux"))]
fn open_device(_config: &DaemonConfig, profile: HardwareProfile) -> Result<Box<dyn RtcClock>, AtdError> {
    Err(atd_rtc::RtcError::unsupported("opening an RTC device", profile).into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_no_rtc_uses_register_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let register = dir.path().join("counter");
        std::fs::write(&register, "6553f100\n")?;
        let config = DaemonConfig {
            profile: HardwareProfile::NoRtc,
            register_file: Some(register),
            ..DaemonConfig::default()
        };
        let clock = open_clock(&config)?;
        assert_eq!(clock.profile(), HardwareProfile::NoRtc);
        assert_eq!(clock.now()?, 1_700_000_000);
        Ok(())
    }

    #[test]
    fn test_missing_device_reports_errno() {
        let config = DaemonConfig {
            rtc_device: PathBuf::from("/nonexistent/rtc9"),
            ..DaemonConfig::default()
        };
        let err = open_clock(&config).err();
        assert_eq!(err.map(|e| e.exit_code()), Some(libc::ENOENT));
    }

    #[test]
    fn test_no_rtc_without_register_file() {
        let config = DaemonConfig {
            profile: HardwareProfile::NoRtc,
            ..DaemonConfig::default()
        };
        assert!(matches!(open_clock(&config), Err(AtdError::Config(_))));
    }
}
