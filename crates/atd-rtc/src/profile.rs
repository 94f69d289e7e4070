//! Hardware quirk profiles.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParseProfileError;

/// Which RTC alarm and descriptor behaviours can be trusted on this device.
///
/// Chosen once at startup and fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareProfile {
    /// Full alarm support; the alarm descriptor works inside `poll(2)`.
    #[default]
    Standard,
    /// Alarms can be set and read, but the descriptor never reports readiness.
    BuggySelect,
    /// No kernel RTC device; only a register-mapped clock, no alarm.
    NoRtc,
    /// Alarms can only be programmed for later the same calendar day.
    SameDayAlarmOnly,
}

impl HardwareProfile {
    /// Every profile, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Standard,
        Self::BuggySelect,
        Self::NoRtc,
        Self::SameDayAlarmOnly,
    ];

    /// Get the profile name as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::BuggySelect => "buggy-select",
            Self::NoRtc => "no-rtc",
            Self::SameDayAlarmOnly => "same-day-alarm-only",
        }
    }

    /// Whether a kernel RTC character device backs this profile.
    #[must_use]
    pub fn has_rtc_device(self) -> bool {
        !matches!(self, Self::NoRtc)
    }

    /// Whether the scheduler programs a wake alarm at all.
    #[must_use]
    pub fn programs_alarm(self) -> bool {
        self.has_rtc_device()
    }

    /// Whether the alarm descriptor may be included in a blocking wait.
    #[must_use]
    pub fn alarm_fd_usable(self) -> bool {
        matches!(self, Self::Standard | Self::SameDayAlarmOnly)
    }

    /// Upper bound on a single wait when nothing else wakes the daemon.
    ///
    /// Profiles whose alarm cannot wake the wait on its own get a short bound
    /// so due jobs are re-checked manually.
    #[must_use]
    pub fn default_max_sleep(self) -> Duration {
        if self.alarm_fd_usable() {
            Duration::from_secs(10 * 60)
        } else {
            Duration::from_secs(30)
        }
    }
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HardwareProfile {
    type Err = ParseProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str() == wanted)
            .ok_or_else(|| ParseProfileError(s.to_string()))
    }
}
