//! Prelude for atd-rtc.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use atd_rtc::prelude::*;
//!
//! let rtc = SimulatedRtc::new(HardwareProfile::NoRtc, 0);
//! assert!(!rtc.profile().programs_alarm());
//! ```

pub use crate::alarm::{SECONDS_PER_DAY, clamp_to_same_day, plan_alarm};
pub use crate::clock::RtcClock;
pub use crate::error::{ParseProfileError, RtcError, RtcResult};
pub use crate::profile::HardwareProfile;
pub use crate::register::RegisterFileRtc;
pub use crate::software_impl::{RtcOp, SimulatedRtc};

#[cfg(target_os = "linux")]
pub use crate::linux::LinuxRtc;
