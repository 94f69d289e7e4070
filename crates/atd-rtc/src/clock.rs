//! RTC trait definition.
//!
//! This module provides the core `RtcClock` trait the scheduler loop is
//! written against. One implementation is selected at startup from the
//! configured [`HardwareProfile`] and injected into the loop.

use std::os::fd::BorrowedFd;

use crate::error::RtcResult;
use crate::profile::HardwareProfile;

/// Clock and wake-alarm hardware.
///
/// All timestamps are whole seconds since the Unix epoch (UTC).
///
/// # Alarm lifecycle
///
/// ```text
/// set_alarm(t) ──► enable_alarm_interrupt(true) ──► wait ──► enable_alarm_interrupt(false)
///                                                     │
///                                             alarm fired? ──► acknowledge_alarm()
/// ```
///
/// Implementations without an alarm (see [`HardwareProfile::NoRtc`]) return
/// [`RtcError::Unsupported`](crate::RtcError::Unsupported) from the alarm
/// operations; callers consult [`HardwareProfile::programs_alarm`] first.
pub trait RtcClock: Send {
    /// The hardware profile this clock was opened with.
    fn profile(&self) -> HardwareProfile;

    /// Read the current time from the clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware cannot be read or reports an
    /// unrepresentable time.
    fn now(&self) -> RtcResult<u64>;

    /// Overwrite the clock with `timestamp`.
    ///
    /// Used to resynchronise the hardware clock from the system wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware rejects the write.
    fn set_time(&mut self, timestamp: u64) -> RtcResult<()>;

    /// Program the wake alarm for `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware rejects the alarm or has none.
    fn set_alarm(&mut self, timestamp: u64) -> RtcResult<()>;

    /// Read back the programmed alarm time.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware cannot be read or has no alarm.
    fn read_alarm(&self) -> RtcResult<u64>;

    /// Enable or disable the alarm interrupt.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware rejects the request or has no alarm.
    fn enable_alarm_interrupt(&mut self, enabled: bool) -> RtcResult<()>;

    /// Descriptor that becomes readable when the alarm fires, if any.
    ///
    /// Whether it may be trusted inside a blocking wait is a property of the
    /// profile, not of the descriptor.
    fn alarm_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }

    /// Consume the pending interrupt record after the alarm fired.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the interrupt record fails.
    fn acknowledge_alarm(&mut self) -> RtcResult<()> {
        Ok(())
    }
}

impl<T: RtcClock + ?Sized> RtcClock for Box<T> {
    fn profile(&self) -> HardwareProfile {
        (**self).profile()
    }

    fn now(&self) -> RtcResult<u64> {
        (**self).now()
    }

    fn set_time(&mut self, timestamp: u64) -> RtcResult<()> {
        (**self).set_time(timestamp)
    }

    fn set_alarm(&mut self, timestamp: u64) -> RtcResult<()> {
        (**self).set_alarm(timestamp)
    }

    fn read_alarm(&self) -> RtcResult<u64> {
        (**self).read_alarm()
    }

    fn enable_alarm_interrupt(&mut self, enabled: bool) -> RtcResult<()> {
        (**self).enable_alarm_interrupt(enabled)
    }

    fn alarm_fd(&self) -> Option<BorrowedFd<'_>> {
        (**self).alarm_fd()
    }

    fn acknowledge_alarm(&mut self) -> RtcResult<()> {
        (**self).acknowledge_alarm()
    }
}
