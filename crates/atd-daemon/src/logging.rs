//! Logging setup.
//!
//! Output goes through `tracing-subscriber`'s fmt layer either to stderr or to
//! the system log. `RUST_LOG` always overrides the verbosity chosen on the
//! command line.

#![allow(unsafe_code, reason = "syslog(3) has no safe binding in libc")]

use std::ffi::CString;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::{Level, Metadata, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::AtdError;

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogBackend {
    /// Human-readable lines on stderr.
    #[default]
    Stderr,
    /// `syslog(3)`, facility `LOG_DAEMON`.
    Syslog,
}

/// Logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Destination.
    pub backend: LogBackend,
    /// Default level when `RUST_LOG` is unset.
    pub level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::Stderr,
            level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    /// Map a `-v` count to a level: info, debug, then trace.
    #[must_use]
    pub fn with_verbosity(backend: LogBackend, verbose: u8) -> Self {
        let level = match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self { backend, level }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`AtdError::Logging`] if a global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<(), AtdError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));

    let fmt_layer = match config.backend {
        LogBackend::Stderr => fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        LogBackend::Syslog => fmt::layer()
            .with_writer(SyslogWriter::open())
            .with_ansi(false)
            .without_time()
            .with_level(false)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    info!(backend = ?config.backend, level = %config.level, "logging initialized");
    Ok(())
}

const SYSLOG_IDENT: &std::ffi::CStr = c"atd";

/// `MakeWriter` that hands each formatted event to `syslog(3)`.
#[derive(Debug)]
pub struct SyslogWriter {
    _private: (),
}

impl SyslogWriter {
    /// Connect to the system logger as `atd` with facility `LOG_DAEMON`.
    #[must_use]
    pub fn open() -> Self {
        // SAFETY: the ident is a 'static C string, as openlog(3) keeps the
        // pointer for later calls.
        unsafe {
            libc::openlog(
                SYSLOG_IDENT.as_ptr(),
                libc::LOG_PID | libc::LOG_NDELAY,
                libc::LOG_DAEMON,
            );
        }
        Self { _private: () }
    }
}

impl<'a> MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogLine;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogLine::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogLine::new(syslog_priority(*meta.level()))
    }
}

/// Syslog priority for a tracing level.
#[must_use]
pub fn syslog_priority(level: Level) -> libc::c_int {
    if level == Level::ERROR {
        libc::LOG_ERR
    } else if level == Level::WARN {
        libc::LOG_WARNING
    } else if level == Level::INFO {
        libc::LOG_INFO
    } else {
        libc::LOG_DEBUG
    }
}

/// One buffered log record, sent when dropped.
#[derive(Debug)]
pub struct SyslogLine {
    priority: libc::c_int,
    buf: Vec<u8>,
}

impl SyslogLine {
    fn new(priority: libc::c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }
}

impl io::Write for SyslogLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogLine {
    fn drop(&mut self) {
        let Some(message) = syslog_message(&self.buf) else {
            return;
        };
        // SAFETY: "%s" consumes exactly one argument, a NUL-terminated string
        // that lives until the call returns.
        unsafe { libc::syslog(self.priority, c"%s".as_ptr(), message.as_ptr()) };
    }
}

/// Turn a formatted event into a syslog message: trailing newlines removed,
/// interior NULs replaced. Empty records yield `None`.
fn syslog_message(buf: &[u8]) -> Option<CString> {
    let end = buf.iter().rposition(|&b| b != b'\n' && b != b'\r')?;
    let bytes: Vec<u8> = buf
        .iter()
        .take(end + 1)
        .map(|&b| if b == 0 { b'?' } else { b })
        .collect();
    CString::new(bytes).ok()
}
