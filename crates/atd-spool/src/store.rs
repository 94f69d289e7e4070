//! Spool directory scanning.
//!
//! Every call lists the directory afresh. Jobs rewrite and delete themselves
//! while the daemon runs, so nothing is cached between scans.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{SpoolError, SpoolResult};
use crate::job::{Job, JobId, due_horizon, parse_name};

/// Permission bits given to submitted jobs.
const JOB_MODE: u32 = 0o755;

/// Read access to the spool directory.
#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Use `dir` as the spool without checking it.
    ///
    /// The daemon passes `"."` after changing into the spool directory, so
    /// job paths come out as `./<due>.<pid>`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Use `dir` as the spool, verifying it is a directory.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Open`] if `dir` is missing or not a directory.
    pub fn open(dir: impl Into<PathBuf>) -> SpoolResult<Self> {
        let dir = dir.into();
        let metadata = fs::metadata(&dir).map_err(|source| SpoolError::Open {
            path: dir.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(SpoolError::Open {
                path: dir,
                source: std::io::Error::from_raw_os_error(libc::ENOTDIR),
            });
        }
        Ok(Self { dir })
    }

    /// The spool directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a job with this id would have.
    #[must_use]
    pub fn job_path(&self, id: JobId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    fn scan_error(&self, source: std::io::Error) -> SpoolError {
        SpoolError::Scan {
            path: self.dir.clone(),
            source,
        }
    }

    /// Every parseable job currently in the spool, in directory order.
    fn jobs(&self) -> SpoolResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| self.scan_error(e))? {
            let entry = entry.map_err(|e| self.scan_error(e))?;
            let file_name = entry.file_name();
            let Some(id) = file_name.to_str().and_then(parse_name) else {
                trace!(entry = ?file_name, "ignoring spool entry");
                continue;
            };
            jobs.push(Job {
                id,
                path: entry.path(),
            });
        }
        Ok(jobs)
    }

    /// Jobs due at `now`: every job with `due <= now + 1`.
    ///
    /// The order is whatever the directory listing produced.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Scan`] if the directory cannot be listed.
    pub fn scan_due(&self, now: u64) -> SpoolResult<Vec<Job>> {
        let horizon = due_horizon(now);
        let due: Vec<Job> = self
            .jobs()?
            .into_iter()
            .filter(|job| job.id.due <= horizon)
            .collect();
        debug!(now, count = due.len(), "scanned for due jobs");
        Ok(due)
    }

    /// Earliest due time strictly after `now + 1`, if any job has one.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Scan`] if the directory cannot be listed.
    pub fn find_next(&self, now: u64) -> SpoolResult<Option<u64>> {
        let horizon = due_horizon(now);
        let next = self
            .jobs()?
            .into_iter()
            .map(|job| job.id.due)
            .filter(|&due| due > horizon)
            .min();
        debug!(now, ?next, "scanned for next job");
        Ok(next)
    }

    /// All jobs, sorted by due time then pid.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Scan`] if the directory cannot be listed.
    pub fn list(&self) -> SpoolResult<Vec<Job>> {
        let mut jobs = self.jobs()?;
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    /// Queue a job with the given script contents.
    ///
    /// The file is written under a hidden temporary name, made executable and
    /// then renamed into place, so a scan never sees a partial job.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Submit`] if any filesystem step fails.
    pub fn submit(&self, id: JobId, contents: &[u8]) -> SpoolResult<Job> {
        let name = id.file_name();
        let submit_error = |source: std::io::Error| SpoolError::Submit {
            path: self.dir.clone(),
            name: name.clone(),
            source,
        };
        let staging = self.dir.join(format!(".{name}.new"));
        let path = self.job_path(id);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(JOB_MODE)
            .open(&staging)
            .map_err(submit_error)?;
        file.write_all(contents).map_err(submit_error)?;
        file.sync_all().map_err(submit_error)?;
        drop(file);

        fs::set_permissions(&staging, fs::Permissions::from_mode(JOB_MODE))
            .map_err(submit_error)?;
        fs::rename(&staging, &path).map_err(submit_error)?;
        debug!(job = %name, "job submitted");
        Ok(Job { id, path })
    }
}
