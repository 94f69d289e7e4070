//! Convenient re-exports for spool consumers.

pub use crate::error::{SpoolError, SpoolResult};
pub use crate::job::{DUE_TOLERANCE_SECS, Job, JobId, due_horizon, parse_name};
pub use crate::store::JobStore;
