//! # atd-rtc
//!
//! Real-time clock access and wake-alarm programming for the atd job daemon.
//!
//! Embedded boards disagree about what their RTC can do. This crate hides the
//! differences behind one trait and a fixed [`HardwareProfile`]:
//!
//! - [`RtcClock`] trait consumed by the scheduler loop
//! - [`LinuxRtc`] for kernel RTC devices driven through `ioctl(2)`
//! - [`RegisterFileRtc`] for boards without a kernel RTC, where the clock chip
//!   is only reachable through a vendor pseudo-file
//! - [`SimulatedRtc`] for tests and hardware-free environments
//! - [`plan_alarm`] to decide which alarm (if any) a profile can program
//!
//! ## Profiles
//!
//! ```text
//! Profile            alarm   alarm fd in wait   max sleep
//! Standard           any     yes                minutes
//! BuggySelect        any     no                 ~30s
//! NoRtc              none    no                 ~30s
//! SameDayAlarmOnly   today   yes                minutes
//! ```
//!
//! ## Example
//!
//! ```rust
//! use atd_rtc::prelude::*;
//!
//! let mut rtc = SimulatedRtc::new(HardwareProfile::Standard, 1_700_000_000);
//! let alarm = plan_alarm(rtc.profile(), rtc.now()?, Some(1_700_000_600));
//! if let Some(at) = alarm {
//!     rtc.set_alarm(at)?;
//!     rtc.enable_alarm_interrupt(true)?;
//! }
//! assert_eq!(rtc.read_alarm()?, 1_700_000_600);
//! # Ok::<(), RtcError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, missing_debug_implementations)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod alarm;
pub mod clock;
pub mod error;
pub mod prelude;
pub mod profile;
pub mod register;
pub mod software_impl;

#[cfg(target_os = "linux")]
pub mod linux;

pub use alarm::{SECONDS_PER_DAY, clamp_to_same_day, plan_alarm};
pub use clock::RtcClock;
pub use error::{ParseProfileError, RtcError, RtcResult};
pub use profile::HardwareProfile;
pub use register::RegisterFileRtc;
pub use software_impl::{RtcOp, SimulatedRtc};

#[cfg(target_os = "linux")]
pub use linux::LinuxRtc;

/// Default kernel RTC character device.
pub const DEFAULT_RTC_DEVICE: &str = "/dev/rtc";
