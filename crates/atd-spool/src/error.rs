//! Error types for the spool crate.

use std::io;
use std::path::PathBuf;

/// Spool access errors.
///
/// An unrecognised directory entry is not an error; it is skipped.
#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    /// The spool directory is missing or not a directory.
    #[error("spool directory {} is not accessible: {source}", .path.display())]
    Open {
        /// Spool directory.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Listing the spool directory failed.
    #[error("failed to scan spool directory {}: {source}", .path.display())]
    Scan {
        /// Spool directory.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Writing a new job file failed.
    #[error("failed to submit job {name} to {}: {source}", .path.display())]
    Submit {
        /// Spool directory.
        path: PathBuf,
        /// Job file name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A string was not a `<due>.<pid>` job name.
    #[error("{0:?} is not a job file name (expected <due>.<pid>)")]
    InvalidName(String),
}

impl SpoolError {
    /// The OS error number behind this error, if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. } | Self::Scan { source, .. } | Self::Submit { source, .. } => {
                source.raw_os_error()
            }
            Self::InvalidName(_) => None,
        }
    }
}

/// Spool result type.
pub type SpoolResult<T> = Result<T, SpoolError>;
