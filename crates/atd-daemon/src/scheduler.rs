//! The scheduler loop.
//!
//! One pass: read the clock, run every due job, find the next job, program
//! the alarm the hardware allows, block until something happens, then handle
//! what woke us. The loop never ends on its own; only a fatal error stops it.

use std::convert::Infallible;
use std::process::ExitStatus;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use atd_rtc::{HardwareProfile, RtcClock, plan_alarm};
use atd_spool::{JobId, JobStore};
use tracing::{debug, info, warn};

use crate::error::AtdError;
use crate::runner::{JobLauncher, JobRunner};
use crate::trigger::{TriggerKind, WakeEvent, WakeSource, classify};

/// The system's wall clock, in whole seconds since the epoch.
pub trait WallClock {
    /// Current time.
    fn now(&self) -> u64;
}

/// [`WallClock`] backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

impl<F: Fn() -> u64> WallClock for F {
    fn now(&self) -> u64 {
        self()
    }
}

/// A job that ran during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    /// Which job.
    pub id: JobId,
    /// How it exited.
    pub status: ExitStatus,
}

/// What one pass of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    /// Time the pass started at.
    pub now: u64,
    /// Jobs that ran, in execution order.
    pub ran: Vec<JobOutcome>,
    /// Jobs that could not be started and stay queued.
    pub launch_failures: Vec<JobId>,
    /// Earliest job still in the future after the due jobs ran.
    pub next: Option<u64>,
    /// Alarm programmed into the RTC, if any.
    pub alarm: Option<u64>,
    /// Longest the wait was allowed to take.
    pub timeout: Duration,
    /// What ended the wait.
    pub event: WakeEvent,
    /// Whether the RTC was set from the wall clock.
    pub resynced: bool,
}

/// How long to wait: `max_sleep`, shortened to the time left until `next`.
#[must_use]
pub fn wait_timeout(max_sleep: Duration, next: Option<u64>, now: u64) -> Duration {
    match next {
        Some(next) => max_sleep.min(Duration::from_secs(next.saturating_sub(now))),
        None => max_sleep,
    }
}

/// The scheduler.
#[derive(Debug)]
pub struct Scheduler<R, W, L = JobRunner, C = SystemClock> {
    rtc: R,
    store: JobStore,
    wake: W,
    launcher: L,
    wall: C,
    max_sleep: Duration,
}

impl<R: RtcClock, W: WakeSource> Scheduler<R, W> {
    /// Build a scheduler with the default runner and system wall clock.
    ///
    /// The wait bound starts at the profile default.
    pub fn new(rtc: R, store: JobStore, wake: W) -> Self {
        let max_sleep = rtc.profile().default_max_sleep();
        Self {
            rtc,
            store,
            wake,
            launcher: JobRunner::new(),
            wall: SystemClock,
            max_sleep,
        }
    }
}

impl<R, W, L, C> Scheduler<R, W, L, C>
where
    R: RtcClock,
    W: WakeSource,
    L: JobLauncher,
    C: WallClock,
{
    /// Replace the job launcher.
    pub fn with_launcher<L2: JobLauncher>(self, launcher: L2) -> Scheduler<R, W, L2, C> {
        Scheduler {
            rtc: self.rtc,
            store: self.store,
            wake: self.wake,
            launcher,
            wall: self.wall,
            max_sleep: self.max_sleep,
        }
    }

    /// Replace the wall clock.
    pub fn with_wall_clock<C2: WallClock>(self, wall: C2) -> Scheduler<R, W, L, C2> {
        Scheduler {
            rtc: self.rtc,
            store: self.store,
            wake: self.wake,
            launcher: self.launcher,
            wall,
            max_sleep: self.max_sleep,
        }
    }

    /// Set the longest single wait.
    #[must_use]
    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = max_sleep;
        self
    }

    /// The clock.
    pub fn rtc(&self) -> &R {
        &self.rtc
    }

    /// The wake source.
    pub fn wake(&self) -> &W {
        &self.wake
    }

    /// The launcher.
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// The spool.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// The current wait bound.
    pub fn max_sleep(&self) -> Duration {
        self.max_sleep
    }

    fn profile(&self) -> HardwareProfile {
        self.rtc.profile()
    }

    /// Current time: the RTC, or the wall clock when there is no RTC device.
    fn current_time(&self) -> Result<u64, AtdError> {
        if self.profile().has_rtc_device() {
            Ok(self.rtc.now()?)
        } else {
            Ok(self.wall.now())
        }
    }

    /// Run one pass of the loop.
    ///
    /// # Errors
    ///
    /// Spool, RTC and wait failures are fatal and returned. A job that cannot
    /// be started is logged and reported in
    /// [`IterationReport::launch_failures`] instead.
    pub fn run_once(&mut self) -> Result<IterationReport, AtdError> {
        let profile = self.profile();
        let now = self.current_time()?;

        let mut ran = Vec::new();
        let mut launch_failures = Vec::new();
        for job in self.store.scan_due(now)? {
            info!(job = %job.id, "running job");
            match self.launcher.run(&job.path) {
                Ok(status) => {
                    info!(job = %job.id, %status, "job finished");
                    ran.push(JobOutcome { id: job.id, status });
                }
                Err(e) => {
                    warn!(job = %job.id, error = %e, "job not started, will retry");
                    launch_failures.push(job.id);
                }
            }
        }

        let next = self.store.find_next(now)?;
        let after = self.current_time()?;

        let alarm = plan_alarm(profile, after, next);
        if let Some(at) = alarm {
            self.rtc.set_alarm(at)?;
            self.rtc.enable_alarm_interrupt(true)?;
            debug!(at, "alarm armed");
        }

        let timeout = wait_timeout(self.max_sleep, next, after);
        let alarm_fd = if alarm.is_some() && profile.alarm_fd_usable() {
            self.rtc.alarm_fd()
        } else {
            None
        };
        debug!(?next, timeout_secs = timeout.as_secs(), alarm_fd = alarm_fd.is_some(), "sleeping");
        let event = self.wake.wait_or_timeout(alarm_fd, timeout)?;

        if alarm.is_some() {
            self.rtc.enable_alarm_interrupt(false)?;
        }

        let mut resynced = false;
        match &event {
            WakeEvent::Alarm => self.rtc.acknowledge_alarm()?,
            WakeEvent::Trigger(payload) if classify(payload) == TriggerKind::ResyncRequested => {
                let wall = self.wall.now();
                self.rtc.set_time(wall)?;
                resynced = true;
                info!(time = wall, "RTC resynchronised from system clock");
            }
            WakeEvent::Trigger(_) | WakeEvent::Timeout => {}
        }
        debug!(?event, "woke up");

        Ok(IterationReport {
            now,
            ran,
            launch_failures,
            next,
            alarm,
            timeout,
            event,
            resynced,
        })
    }

    /// Run passes forever.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; there is no other way out.
    pub fn run(&mut self) -> Result<Infallible, AtdError> {
        info!(
            profile = %self.profile(),
            max_sleep_secs = self.max_sleep.as_secs(),
            spool = %self.store.dir().display(),
            "scheduler started"
        );
        loop {
            self.run_once()?;
        }
    }
}
