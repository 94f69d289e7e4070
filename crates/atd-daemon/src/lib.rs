//! atd - RTC-backed one-shot job daemon
//!
//! Jobs are executable files in a spool directory named `<due>.<pid>`. The
//! daemon runs each one once its due time arrives, then sleeps until the next
//! job using the RTC alarm where the hardware allows it. Clients wake it
//! early through the `trigger` FIFO in the spool.
//!
//! The pieces:
//!
//! - [`Scheduler`]: the loop
//! - [`WakeTrigger`]: the FIFO plus the `poll(2)` wait
//! - [`JobRunner`]: sequential job execution
//! - [`DaemonConfig`]: settings from JSON and the command line
//! - [`init_logging`]: stderr or syslog output
//!
//! Clock access and the spool live in `atd-rtc` and `atd-spool`.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod runner;
pub mod scheduler;
pub mod trigger;

pub use config::{ConfigOverrides, DaemonConfig};
pub use error::{AtdError, ConfigError, LaunchError};
pub use hardware::open_clock;
pub use logging::{LogBackend, LoggingConfig, init_logging};
pub use runner::{EXEC_FAILURE_STATUS, JobLauncher, JobRunner};
pub use scheduler::{IterationReport, JobOutcome, Scheduler, SystemClock, WallClock, wait_timeout};
pub use trigger::{TriggerKind, WakeEvent, WakeSource, WakeTrigger, classify};
