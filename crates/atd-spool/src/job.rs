//! Job identity and file name parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SpoolError;

/// Extra seconds a job may lie in the future and still count as due.
pub const DUE_TOLERANCE_SECS: u64 = 1;

/// Latest due time that counts as due at `now`.
#[must_use]
pub fn due_horizon(now: u64) -> u64 {
    now.saturating_add(DUE_TOLERANCE_SECS)
}

/// Identity of a job, encoded in its file name as `"<due>.<origin_pid>"`.
///
/// Ordering is by due time first, then by originating pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    /// Wall-clock second the job should run at.
    pub due: u64,
    /// Pid of the process that queued the job.
    pub origin_pid: u32,
}

impl JobId {
    /// Create a job id.
    #[must_use]
    pub const fn new(due: u64, origin_pid: u32) -> Self {
        Self { due, origin_pid }
    }

    /// The spool file name for this job.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.to_string()
    }

    /// Whether the job is due at `now`, tolerance included.
    #[must_use]
    pub fn is_due(&self, now: u64) -> bool {
        self.due <= due_horizon(now)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.due, self.origin_pid)
    }
}

impl FromStr for JobId {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s).ok_or_else(|| SpoolError::InvalidName(s.to_string()))
    }
}

/// A job file found in the spool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Identity parsed from the file name.
    pub id: JobId,
    /// Path to execute, relative to the working directory when the spool
    /// directory is.
    pub path: PathBuf,
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a spool entry name.
///
/// Succeeds only when the whole name is `<ascii digits>.<ascii digits>` and
/// both numbers fit their types. Everything else yields `None`.
///
/// A due time of `0` is accepted; such a job is due on every pass.
#[must_use]
pub fn parse_name(name: &str) -> Option<JobId> {
    let (due, pid) = name.split_once('.')?;
    if !all_digits(due) || !all_digits(pid) {
        return None;
    }
    Some(JobId {
        due: due.parse().ok()?,
        origin_pid: pid.parse().ok()?,
    })
}
