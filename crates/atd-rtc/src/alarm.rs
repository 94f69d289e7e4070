//! Alarm planning.
//!
//! Turns "the next job is due at `t`" into the alarm a given profile can
//! actually program.

use crate::profile::HardwareProfile;

/// Seconds in one UTC calendar day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Clamp `wake` to 23:59:59 of the UTC day containing `now`.
///
/// Returns `wake` unchanged when it already falls on that day or earlier.
#[must_use]
pub fn clamp_to_same_day(now: u64, wake: u64) -> u64 {
    let today = now / SECONDS_PER_DAY;
    if wake / SECONDS_PER_DAY > today {
        today * SECONDS_PER_DAY + (SECONDS_PER_DAY - 1)
    } else {
        wake
    }
}

/// Decide which alarm to program for the next pending job.
///
/// `rtc_now` must be a reading of the clock the alarm will be programmed on.
/// Returns `None` when nothing should be programmed: the profile has no
/// alarm, or no job is pending.
#[must_use]
pub fn plan_alarm(profile: HardwareProfile, rtc_now: u64, next: Option<u64>) -> Option<u64> {
    if !profile.programs_alarm() {
        return None;
    }
    let next = next?;
    match profile {
        HardwareProfile::SameDayAlarmOnly => Some(clamp_to_same_day(rtc_now, next)),
        _ => Some(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14T22:13:20Z
    const NOW: u64 = 1_700_000_000;
    // 2023-11-14T23:59:59Z
    const END_OF_DAY: u64 = 1_700_006_399;

    #[test]
    fn test_same_day_is_untouched() {
        assert_eq!(clamp_to_same_day(NOW, NOW + 60), NOW + 60);
        assert_eq!(clamp_to_same_day(NOW, END_OF_DAY), END_OF_DAY);
    }

    #[test]
    fn test_later_day_is_clamped() {
        assert_eq!(clamp_to_same_day(NOW, END_OF_DAY + 1), END_OF_DAY);
        assert_eq!(clamp_to_same_day(NOW, NOW + 3 * SECONDS_PER_DAY), END_OF_DAY);
    }

    #[test]
    fn test_plan_alarm_per_profile() {
        let next = Some(NOW + 3 * SECONDS_PER_DAY);
        assert_eq!(plan_alarm(HardwareProfile::Standard, NOW, next), next);
        assert_eq!(plan_alarm(HardwareProfile::BuggySelect, NOW, next), next);
        assert_eq!(plan_alarm(HardwareProfile::NoRtc, NOW, next), None);
        assert_eq!(
            plan_alarm(HardwareProfile::SameDayAlarmOnly, NOW, next),
            Some(END_OF_DAY)
        );
    }

    #[test]
    fn test_plan_alarm_without_job() {
        for profile in HardwareProfile::ALL {
            assert_eq!(plan_alarm(profile, NOW, None), None);
        }
    }
}
