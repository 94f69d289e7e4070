//! Filesystem job spool for the atd job daemon.
//!
//! Every pending job is one executable file in the spool directory, named
//! `"<due>.<origin_pid>"` where `due` is the wall-clock second it should run
//! at. The spool is the only persistent state; this crate reads it:
//!
//! - **[`parse_name`]**: strict `<digits>.<digits>` file name parsing
//! - **[`JobStore::scan_due`]**: every job due by `now + 1`
//! - **[`JobStore::find_next`]**: earliest job due after `now + 1`
//! - **[`JobStore::submit`]**: atomic job creation for clients
//!
//! Entries that are not job names (the trigger FIFO, editor droppings,
//! temporary files) are ignored, never reported.
//!
//! # Race tolerance
//!
//! A job due within the next second counts as due now. The daemon computes
//! "now" once per pass; without the extra second a job landing exactly on the
//! loop boundary could be skipped by the due scan and then be excluded from
//! the next-wake computation as well.
//!
//! # Example
//!
//! ```no_run
//! use atd_spool::JobStore;
//!
//! let store = JobStore::open("/var/spool/at")?;
//! for job in store.scan_due(1_700_000_000)? {
//!     println!("due: {}", job.path.display());
//! }
//! # Ok::<(), atd_spool::SpoolError>(())
//! ```

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod error;
pub mod job;
pub mod store;

pub mod prelude;

pub use error::{SpoolError, SpoolResult};
pub use job::{DUE_TOLERANCE_SECS, Job, JobId, due_horizon, parse_name};
pub use store::JobStore;
