//! Daemon error taxonomy.
//!
//! Everything in [`AtdError`] is fatal: the daemon logs it and exits with the
//! errno of the failing call. [`LaunchError`] is the one recoverable failure
//! and never leaves the scheduler loop.

use std::io;
use std::path::PathBuf;

use atd_rtc::RtcError;
use atd_spool::SpoolError;

/// Exit code used when a fatal error carries no OS error number.
pub const GENERIC_EXIT_CODE: i32 = 1;

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid JSON for [`crate::DaemonConfig`].
    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The spool directory could not be entered.
    #[error("cannot enter spool directory {}: {source}", .path.display())]
    SpoolDir {
        /// Spool directory.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A setting is out of range or inconsistent with the others.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal daemon errors.
#[derive(Debug, thiserror::Error)]
pub enum AtdError {
    /// Startup configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A resource the daemon needs could not be set up.
    #[error("failed to {operation} {}: {source}", .path.display())]
    ResourceInit {
        /// What was being done, e.g. `"create trigger FIFO"`.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// RTC access failed.
    #[error("RTC failure: {0}")]
    Hardware(#[from] RtcError),

    /// The spool directory could not be read.
    #[error(transparent)]
    Spool(#[from] SpoolError),

    /// Blocking on the wake sources failed.
    #[error("waiting for wake events failed: {0}")]
    Wait(#[source] io::Error),

    /// The log subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

impl AtdError {
    /// The OS error number behind this error, if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Config(ConfigError::Read { source, .. } | ConfigError::SpoolDir { source, .. })
            | Self::ResourceInit { source, .. }
            | Self::Wait(source) => source.raw_os_error(),
            Self::Hardware(e) => e.raw_os_error(),
            Self::Spool(e) => e.raw_os_error(),
            Self::Config(ConfigError::Parse { .. } | ConfigError::Invalid(_)) | Self::Logging(_) => {
                None
            }
        }
    }

    /// Process exit code for this error: its errno, or [`GENERIC_EXIT_CODE`].
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.raw_os_error() {
            Some(errno) if errno > 0 => errno,
            _ => GENERIC_EXIT_CODE,
        }
    }
}

/// A job could not be started at all (the process was never created).
///
/// The job stays in the spool and is retried on the next pass.
#[derive(Debug, thiserror::Error)]
#[error("failed to start job {}: {source}", .path.display())]
pub struct LaunchError {
    /// Job file.
    pub path: PathBuf,
    /// Underlying OS error.
    #[source]
    pub source: io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_is_errno() {
        let err = AtdError::ResourceInit {
            operation: "create trigger FIFO",
            path: PathBuf::from("trigger.new"),
            source: io::Error::from_raw_os_error(libc::EACCES),
        };
        assert_eq!(err.exit_code(), libc::EACCES);
        assert_eq!(
            err.to_string(),
            "failed to create trigger FIFO trigger.new: Permission denied (os error 13)"
        );

        let err = AtdError::Hardware(RtcError::Ioctl {
            request: "RTC_RD_TIME",
            source: io::Error::from_raw_os_error(libc::EIO),
        });
        assert_eq!(err.exit_code(), libc::EIO);
    }

    #[test]
    fn test_exit_code_without_errno() {
        let err = AtdError::from(ConfigError::Invalid("max_sleep_secs must be positive".into()));
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(err.exit_code(), GENERIC_EXIT_CODE);

        let err = AtdError::Hardware(RtcError::invalid_time("month 13"));
        assert_eq!(err.exit_code(), GENERIC_EXIT_CODE);

        let err = AtdError::Wait(io::Error::other("no errno"));
        assert_eq!(err.exit_code(), GENERIC_EXIT_CODE);
    }

    #[test]
    fn test_spool_errors_keep_errno() {
        let err = AtdError::from(SpoolError::Scan {
            path: PathBuf::from("."),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        });
        assert_eq!(err.exit_code(), libc::ENOENT);
    }
}
