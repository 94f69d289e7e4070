//! Job execution.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::debug;

use crate::error::LaunchError;

/// Exit status reported when a job's file cannot be executed, as a shell
/// reports for a missing or non-executable command.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Runs a job file to completion.
pub trait JobLauncher {
    /// Start `path` with no arguments and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] if no process could be created.
    fn run(&mut self, path: &Path) -> Result<ExitStatus, LaunchError>;
}

/// Launches jobs as child processes, one at a time.
///
/// The child inherits the daemon's environment, working directory and
/// standard streams. The job file is never modified.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobRunner;

impl JobRunner {
    /// Create a runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Errors from process creation itself, as opposed to loading the job file.
///
/// `ENOMEM` and `EMFILE` can also come from `execve`, and `Command::spawn`
/// reports both the same way. A job whose exec fails with one of them is
/// treated as not started and retried, not reported as status 127.
fn is_fork_failure(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EAGAIN | libc::ENOMEM | libc::EMFILE | libc::ENFILE)
    )
}

/// A bare file name would be looked up in `PATH`; anchor it to the working
/// directory instead.
fn exec_path(path: &Path) -> PathBuf {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Path::new(".").join(path),
        _ => path.to_path_buf(),
    }
}

impl JobLauncher for JobRunner {
    fn run(&mut self, path: &Path) -> Result<ExitStatus, LaunchError> {
        let program = exec_path(path);
        let mut child = match Command::new(&program).spawn() {
            Ok(child) => child,
            Err(e) if is_fork_failure(&e) => {
                return Err(LaunchError {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                debug!(job = %path.display(), error = %e, "job could not be executed");
                return Ok(ExitStatus::from_raw(EXEC_FAILURE_STATUS << 8));
            }
        };
        debug!(job = %path.display(), pid = child.id(), "job started");
        // `wait` restarts on EINTR.
        child.wait().map_err(|source| LaunchError {
            path: path.to_path_buf(),
            source,
        })
    }
}
