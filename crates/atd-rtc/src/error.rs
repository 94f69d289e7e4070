//! Error types for RTC operations.

use std::io;
use std::path::PathBuf;

use crate::profile::HardwareProfile;

/// Errors that can occur while talking to the clock hardware.
#[derive(Debug, thiserror::Error)]
pub enum RtcError {
    /// The RTC character device could not be opened.
    #[error("failed to open RTC device {}: {source}", .path.display())]
    Open {
        /// Device path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// An RTC ioctl request failed.
    #[error("RTC ioctl {request} failed: {source}")]
    Ioctl {
        /// Symbolic request name, e.g. `RTC_RD_TIME`.
        request: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading the RTC device itself failed.
    #[error("RTC device {}: {source}", .path.display())]
    Device {
        /// Device path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading or writing a register pseudo-file failed.
    #[error("register file {}: {source}", .path.display())]
    Register {
        /// Register file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A register pseudo-file did not contain an ASCII hex counter.
    #[error("register file {} holds {content:?}, expected an ASCII hex counter", .path.display())]
    InvalidRegister {
        /// Register file path.
        path: PathBuf,
        /// The offending content, trimmed.
        content: String,
    },

    /// The hardware reported (or was asked to store) a time that cannot be
    /// represented as seconds since the epoch.
    #[error("unrepresentable RTC time: {0}")]
    InvalidTime(String),

    /// The active profile has no such capability.
    #[error("{operation} is not supported by the {profile} profile")]
    Unsupported {
        /// Operation that was attempted.
        operation: &'static str,
        /// Active hardware profile.
        profile: HardwareProfile,
    },
}

impl RtcError {
    /// Create an invalid time error.
    #[must_use]
    pub fn invalid_time(msg: impl Into<String>) -> Self {
        Self::InvalidTime(msg.into())
    }

    /// Create an unsupported operation error.
    #[must_use]
    pub fn unsupported(operation: &'static str, profile: HardwareProfile) -> Self {
        Self::Unsupported { operation, profile }
    }

    /// The OS error number behind this error, if any.
    ///
    /// The daemon exits with this value on fatal hardware failures.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. }
            | Self::Ioctl { source, .. }
            | Self::Device { source, .. }
            | Self::Register { source, .. } => source.raw_os_error(),
            Self::InvalidRegister { .. } | Self::InvalidTime(_) | Self::Unsupported { .. } => None,
        }
    }

    /// Check if this error only reports a missing capability.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// A specialized `Result` type for RTC operations.
pub type RtcResult<T> = Result<T, RtcError>;

/// Returned when a hardware profile name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hardware profile {0:?} (expected standard, buggy-select, no-rtc or same-day-alarm-only)")]
pub struct ParseProfileError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RtcError::Ioctl {
            request: "RTC_RD_TIME",
            source: io::Error::from_raw_os_error(libc::EIO),
        };
        assert!(err.to_string().starts_with("RTC ioctl RTC_RD_TIME failed"));

        let err = RtcError::unsupported("set_alarm", HardwareProfile::NoRtc);
        assert_eq!(
            err.to_string(),
            "set_alarm is not supported by the no-rtc profile"
        );
    }

    #[test]
    fn test_raw_os_error() {
        let err = RtcError::Open {
            path: PathBuf::from("/dev/rtc"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        assert_eq!(RtcError::invalid_time("bad").raw_os_error(), None);
    }

    #[test]
    fn test_is_unsupported() {
        assert!(RtcError::unsupported("read_alarm", HardwareProfile::NoRtc).is_unsupported());
        assert!(!RtcError::invalid_time("x").is_unsupported());
    }
}
