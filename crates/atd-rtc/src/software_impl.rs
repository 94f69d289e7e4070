//! Simulated clock implementation.
//!
//! This module provides `SimulatedRtc`, an in-memory implementation of the
//! `RtcClock` trait for tests and hardware-free environments. It honours the
//! quirks of the profile it was created with and records every operation.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::alarm::SECONDS_PER_DAY;
use crate::clock::RtcClock;
use crate::error::{RtcError, RtcResult};
use crate::profile::HardwareProfile;

/// A recorded hardware operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcOp {
    /// The clock was overwritten.
    SetTime(u64),
    /// An alarm was programmed.
    SetAlarm(u64),
    /// The alarm interrupt was switched on or off.
    AlarmInterrupt(bool),
    /// A fired alarm was acknowledged.
    AlarmAcknowledged,
}

#[derive(Debug)]
struct SimState {
    time: u64,
    alarm: Option<u64>,
    interrupt_enabled: bool,
    ops: Vec<RtcOp>,
}

/// In-memory RTC.
///
/// Clones share the same state, so a test can keep a handle while the
/// scheduler owns another.
///
/// # Example
///
/// ```rust
/// use atd_rtc::{HardwareProfile, RtcClock, RtcOp, SimulatedRtc};
///
/// let handle = SimulatedRtc::new(HardwareProfile::Standard, 1_000);
/// let mut rtc = handle.clone();
/// rtc.set_alarm(1_060).expect("alarm accepted");
/// handle.advance(60);
/// assert_eq!(rtc.now().expect("readable"), 1_060);
/// assert_eq!(handle.ops(), vec![RtcOp::SetAlarm(1_060)]);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedRtc {
    profile: HardwareProfile,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedRtc {
    /// Create a simulated clock reading `time`.
    #[must_use]
    pub fn new(profile: HardwareProfile, time: u64) -> Self {
        Self {
            profile,
            state: Arc::new(Mutex::new(SimState {
                time,
                alarm: None,
                interrupt_enabled: false,
                ops: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_alarm(&self, operation: &'static str) -> RtcResult<()> {
        if self.profile.programs_alarm() {
            Ok(())
        } else {
            Err(RtcError::unsupported(operation, self.profile))
        }
    }

    /// Move the clock forward by `seconds` without recording an operation.
    pub fn advance(&self, seconds: u64) {
        let mut state = self.state();
        state.time = state.time.saturating_add(seconds);
    }

    /// Set the clock without recording an operation.
    pub fn set_clock(&self, time: u64) {
        self.state().time = time;
    }

    /// Currently programmed alarm.
    #[must_use]
    pub fn alarm(&self) -> Option<u64> {
        self.state().alarm
    }

    /// Whether the alarm interrupt is enabled.
    #[must_use]
    pub fn interrupt_enabled(&self) -> bool {
        self.state().interrupt_enabled
    }

    /// Whether an enabled alarm would have fired by now.
    #[must_use]
    pub fn alarm_due(&self) -> bool {
        let state = self.state();
        state.interrupt_enabled && state.alarm.is_some_and(|at| at <= state.time)
    }

    /// Snapshot of every recorded operation.
    #[must_use]
    pub fn ops(&self) -> Vec<RtcOp> {
        self.state().ops.clone()
    }

    /// Forget recorded operations.
    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }
}

impl RtcClock for SimulatedRtc {
    fn profile(&self) -> HardwareProfile {
        self.profile
    }

    fn now(&self) -> RtcResult<u64> {
        Ok(self.state().time)
    }

    fn set_time(&mut self, timestamp: u64) -> RtcResult<()> {
        let mut state = self.state();
        state.time = timestamp;
        state.ops.push(RtcOp::SetTime(timestamp));
        Ok(())
    }

    fn set_alarm(&mut self, timestamp: u64) -> RtcResult<()> {
        self.require_alarm("set_alarm")?;
        let mut state = self.state();
        if self.profile == HardwareProfile::SameDayAlarmOnly
            && timestamp / SECONDS_PER_DAY != state.time / SECONDS_PER_DAY
        {
            return Err(RtcError::Ioctl {
                request: "RTC_ALM_SET",
                source: io::Error::from_raw_os_error(libc::EINVAL),
            });
        }
        state.alarm = Some(timestamp);
        state.ops.push(RtcOp::SetAlarm(timestamp));
        Ok(())
    }

    fn read_alarm(&self) -> RtcResult<u64> {
        self.require_alarm("read_alarm")?;
        self.state()
            .alarm
            .ok_or_else(|| RtcError::invalid_time("no alarm programmed"))
    }

    fn enable_alarm_interrupt(&mut self, enabled: bool) -> RtcResult<()> {
        self.require_alarm("enable_alarm_interrupt")?;
        let mut state = self.state();
        state.interrupt_enabled = enabled;
        state.ops.push(RtcOp::AlarmInterrupt(enabled));
        Ok(())
    }

    fn acknowledge_alarm(&mut self) -> RtcResult<()> {
        self.state().ops.push(RtcOp::AlarmAcknowledged);
        Ok(())
    }
}
