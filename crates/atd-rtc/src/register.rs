//! Register-file clock for boards without a kernel RTC.
//!
//! Some boards expose their clock chip only through a vendor pseudo-file
//! holding the seconds counter as ASCII hex (optionally `0x`-prefixed). There
//! is no alarm and no interrupt; the scheduler falls back to a bounded wait.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::clock::RtcClock;
use crate::error::{RtcError, RtcResult};
use crate::profile::HardwareProfile;

/// Clock chip reachable only through an ASCII-hex register pseudo-file.
#[derive(Debug, Clone)]
pub struct RegisterFileRtc {
    path: PathBuf,
}

impl RegisterFileRtc {
    /// Use the register file at `path` without touching it.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the register file at `path`, verifying it can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn open(path: impl Into<PathBuf>) -> RtcResult<Self> {
        let rtc = Self::new(path);
        let counter = rtc.now()?;
        debug!(path = %rtc.path.display(), counter, "register clock opened");
        Ok(rtc)
    }

    /// Path of the register pseudo-file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn register_error(&self, source: std::io::Error) -> RtcError {
        RtcError::Register {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse an ASCII hex counter, tolerating surrounding whitespace and a `0x`.
fn parse_hex_counter(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

impl RtcClock for RegisterFileRtc {
    fn profile(&self) -> HardwareProfile {
        HardwareProfile::NoRtc
    }

    fn now(&self) -> RtcResult<u64> {
        let raw = fs::read_to_string(&self.path).map_err(|e| self.register_error(e))?;
        parse_hex_counter(&raw).ok_or_else(|| RtcError::InvalidRegister {
            path: self.path.clone(),
            content: raw.trim().to_string(),
        })
    }

    fn set_time(&mut self, timestamp: u64) -> RtcResult<()> {
        fs::write(&self.path, format!("{timestamp:08x}\n")).map_err(|e| self.register_error(e))?;
        debug!(path = %self.path.display(), timestamp, "register clock written");
        Ok(())
    }

    fn set_alarm(&mut self, _timestamp: u64) -> RtcResult<()> {
        Err(RtcError::unsupported("set_alarm", HardwareProfile::NoRtc))
    }

    fn read_alarm(&self) -> RtcResult<u64> {
        Err(RtcError::unsupported("read_alarm", HardwareProfile::NoRtc))
    }

    fn enable_alarm_interrupt(&mut self, _enabled: bool) -> RtcResult<()> {
        Err(RtcError::unsupported(
            "enable_alarm_interrupt",
            HardwareProfile::NoRtc,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_counter() {
        assert_eq!(parse_hex_counter("6553f100\n"), Some(0x6553_f100));
        assert_eq!(parse_hex_counter("  0x1F "), Some(31));
        assert_eq!(parse_hex_counter("0X0"), Some(0));
        assert_eq!(parse_hex_counter(""), None);
        assert_eq!(parse_hex_counter("0x"), None);
        assert_eq!(parse_hex_counter("12g4"), None);
        assert_eq!(parse_hex_counter("+12"), None);
    }

    #[test]
    fn test_alarm_is_unsupported() {
        let mut rtc = RegisterFileRtc::new("/nonexistent/register");
        assert!(matches!(
            rtc.set_alarm(1),
            Err(RtcError::Unsupported { .. })
        ));
        assert!(matches!(rtc.read_alarm(), Err(RtcError::Unsupported { .. })));
        assert!(matches!(
            rtc.enable_alarm_interrupt(true),
            Err(RtcError::Unsupported { .. })
        ));
        assert!(rtc.alarm_fd().is_none());
    }

    #[test]
    fn test_missing_file_reports_register_error() {
        let rtc = RegisterFileRtc::new("/nonexistent/register");
        assert!(matches!(rtc.now(), Err(RtcError::Register { .. })));
    }
}
