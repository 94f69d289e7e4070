//! Wake trigger FIFO.
//!
//! Clients wake the daemon by writing to the named pipe `trigger` in the
//! spool directory. A payload containing `W` additionally asks the daemon to
//! copy the system time into the RTC.
//!
//! The daemon opens the FIFO read/write, so there is always a writer and a
//! client hanging up never makes the pipe report end-of-file.

#![allow(unsafe_code, reason = "mkfifo(3) and poll(2) have no safe std wrapper")]

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::error::AtdError;

/// File name of the trigger FIFO inside the spool directory.
pub const TRIGGER_NAME: &str = "trigger";

/// Name the FIFO is created under before being renamed into place.
pub const TRIGGER_STAGING_NAME: &str = "trigger.new";

/// Payload byte that requests an RTC resync.
pub const RESYNC_BYTE: u8 = b'W';

const TRIGGER_MODE: u32 = 0o777;
const DRAIN_CHUNK: usize = 256;

/// What ended a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeEvent {
    /// The RTC alarm fired.
    Alarm,
    /// Someone wrote to the trigger. All pending writes are concatenated.
    Trigger(Vec<u8>),
    /// Nothing happened before the timeout.
    Timeout,
}

/// Meaning of a trigger payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Copy the system time into the RTC, then rescan.
    ResyncRequested,
    /// Just rescan.
    PlainWake,
}

/// Classify a trigger payload: resync iff it contains `W` anywhere.
#[must_use]
pub fn classify(payload: &[u8]) -> TriggerKind {
    if payload.contains(&RESYNC_BYTE) {
        TriggerKind::ResyncRequested
    } else {
        TriggerKind::PlainWake
    }
}

/// Something the scheduler can block on.
pub trait WakeSource {
    /// Block until a wake event, or until `timeout` elapses.
    ///
    /// `alarm_fd`, when given, is watched for readability as the RTC alarm.
    ///
    /// # Errors
    ///
    /// Returns [`AtdError::Wait`] if waiting itself fails.
    fn wait_or_timeout(
        &mut self,
        alarm_fd: Option<BorrowedFd<'_>>,
        timeout: Duration,
    ) -> Result<WakeEvent, AtdError>;
}

/// The daemon's end of the trigger FIFO.
#[derive(Debug)]
pub struct WakeTrigger {
    fifo: File,
    path: PathBuf,
}

fn init_error<'a>(
    operation: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> AtdError + 'a {
    move |source| AtdError::ResourceInit {
        operation,
        path: path.to_path_buf(),
        source,
    }
}

fn mkfifo(path: &Path, mode: libc::mode_t) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl WakeTrigger {
    /// Create `trigger` in `dir` and open it.
    ///
    /// The FIFO is made as `trigger.new`, given mode 0777 regardless of the
    /// umask and renamed over any previous `trigger`, so clients never see a
    /// half-created pipe. A stale `trigger.new` is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`AtdError::ResourceInit`] if any step fails.
    pub fn create(dir: &Path) -> Result<Self, AtdError> {
        let staging = dir.join(TRIGGER_STAGING_NAME);
        let path = dir.join(TRIGGER_NAME);

        match fs::remove_file(&staging) {
            Ok(()) => debug!(path = %staging.display(), "removed stale trigger"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(init_error("remove stale trigger", &staging)(e)),
        }
        mkfifo(&staging, TRIGGER_MODE).map_err(init_error("create trigger FIFO", &staging))?;
        fs::set_permissions(&staging, fs::Permissions::from_mode(TRIGGER_MODE))
            .map_err(init_error("set trigger permissions on", &staging))?;
        fs::rename(&staging, &path).map_err(init_error("install trigger", &path))?;

        let fifo = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(&path)
            .map_err(init_error("open trigger", &path))?;

        info!(path = %path.display(), "wake trigger ready");
        Ok(Self { fifo, path })
    }

    /// Path of the FIFO.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read everything currently buffered in the FIFO.
    fn drain(&mut self) -> Result<Vec<u8>, AtdError> {
        let mut payload = Vec::new();
        let mut chunk = [0u8; DRAIN_CHUNK];
        loop {
            match self.fifo.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => payload.extend_from_slice(chunk.get(..n).unwrap_or_default()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(AtdError::Wait(e)),
            }
        }
        Ok(payload)
    }
}

/// Milliseconds for `poll(2)`, rounded up so a short remainder does not spin.
fn poll_timeout_ms(remaining: Duration) -> libc::c_int {
    let ms = remaining.as_micros().div_ceil(1_000);
    libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}

impl WakeSource for WakeTrigger {
    fn wait_or_timeout(
        &mut self,
        alarm_fd: Option<BorrowedFd<'_>>,
        timeout: Duration,
    ) -> Result<WakeEvent, AtdError> {
        let started = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            let mut fds = [
                libc::pollfd {
                    fd: self.fifo.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: alarm_fd.map_or(-1, |fd| fd.as_raw_fd()),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let nfds: libc::nfds_t = if alarm_fd.is_some() { 2 } else { 1 };
            // SAFETY: `fds` is a live array of at least `nfds` pollfd entries
            // and both descriptors stay open for the duration of the call.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), nfds, poll_timeout_ms(remaining)) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    trace!("wait interrupted, restarting");
                    continue;
                }
                return Err(AtdError::Wait(err));
            }
            if rc == 0 {
                return Ok(WakeEvent::Timeout);
            }

            let [trigger, alarm] = fds;
            if trigger.revents != 0 {
                let payload = self.drain()?;
                debug!(bytes = payload.len(), "trigger fired");
                return Ok(WakeEvent::Trigger(payload));
            }
            if alarm.revents != 0 {
                debug!("RTC alarm fired");
                return Ok(WakeEvent::Alarm);
            }
        }
    }
}

/// Write `payload` to the trigger in `spool_dir`.
///
/// Never blocks: with no daemon holding the FIFO open this fails with
/// `ENXIO` instead of waiting for a reader.
///
/// # Errors
///
/// Fails if `trigger` is missing, is not a FIFO, has no reader or cannot be
/// written.
pub fn send(spool_dir: &Path, payload: &[u8]) -> io::Result<()> {
    let path = spool_dir.join(TRIGGER_NAME);
    if !fs::metadata(&path)?.file_type().is_fifo() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a FIFO", path.display()),
        ));
    }
    let mut fifo = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
        .open(&path)?;
    fifo.write_all(payload)
}

/// Ask the daemon to rescan the spool.
///
/// # Errors
///
/// See [`send`].
pub fn request_wake(spool_dir: &Path) -> io::Result<()> {
    send(spool_dir, b"\n")
}

/// Ask the daemon to copy the system time into the RTC and rescan.
///
/// # Errors
///
/// See [`send`].
pub fn request_resync(spool_dir: &Path) -> io::Result<()> {
    send(spool_dir, &[RESYNC_BYTE])
}
