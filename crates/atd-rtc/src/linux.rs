//! Linux RTC character device (`/dev/rtc*`).
//!
//! Uses the `linux/rtc.h` ioctl interface:
//! - `RTC_RD_TIME` / `RTC_SET_TIME` for the clock
//! - `RTC_WKALM_SET` / `RTC_WKALM_RD` for full-date alarms
//! - `RTC_ALM_SET` / `RTC_ALM_READ` for time-of-day alarms (same-day hardware)
//! - `RTC_AIE_ON` / `RTC_AIE_OFF` for the alarm interrupt
//!
//! The RTC is assumed to keep UTC. A fired alarm makes the device readable;
//! reading it returns one `unsigned long` interrupt record.

#![allow(
    unsafe_code,
    reason = "the RTC interface is ioctl(2) only; libc has no safe wrapper"
)]

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use libc::c_int;
use tracing::{debug, trace};

use crate::alarm::SECONDS_PER_DAY;
use crate::clock::RtcClock;
use crate::error::{RtcError, RtcResult};
use crate::profile::HardwareProfile;

const RTC_IOCTL_TYPE: u8 = b'p';
const RTC_NR_AIE_ON: u8 = 0x01;
const RTC_NR_AIE_OFF: u8 = 0x02;
const RTC_NR_ALM_SET: u8 = 0x07;
const RTC_NR_ALM_READ: u8 = 0x08;
const RTC_NR_RD_TIME: u8 = 0x09;
const RTC_NR_SET_TIME: u8 = 0x0a;
const RTC_NR_WKALM_SET: u8 = 0x0f;
const RTC_NR_WKALM_RD: u8 = 0x10;

// Generic ioctl number layout (x86, ARM, RISC-V).
const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// `struct rtc_time` from `linux/rtc.h`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RtcTime {
    tm_sec: c_int,
    tm_min: c_int,
    tm_hour: c_int,
    tm_mday: c_int,
    tm_mon: c_int,
    tm_year: c_int,
    tm_wday: c_int,
    tm_yday: c_int,
    tm_isdst: c_int,
}

/// `struct rtc_wkalrm` from `linux/rtc.h`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct RtcWakeAlarm {
    enabled: u8,
    pending: u8,
    time: RtcTime,
}

const fn ioctl_code(direction: u32, kind: u8, nr: u8, size: usize) -> libc::c_ulong {
    ((direction << IOC_DIRSHIFT)
        | ((kind as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

const fn io_none(nr: u8) -> libc::c_ulong {
    ioctl_code(IOC_NONE, RTC_IOCTL_TYPE, nr, 0)
}

const fn io_read<T>(nr: u8) -> libc::c_ulong {
    ioctl_code(IOC_READ, RTC_IOCTL_TYPE, nr, std::mem::size_of::<T>())
}

const fn io_write<T>(nr: u8) -> libc::c_ulong {
    ioctl_code(IOC_WRITE, RTC_IOCTL_TYPE, nr, std::mem::size_of::<T>())
}

const RTC_AIE_ON: libc::c_ulong = io_none(RTC_NR_AIE_ON);
const RTC_AIE_OFF: libc::c_ulong = io_none(RTC_NR_AIE_OFF);
const RTC_ALM_SET: libc::c_ulong = io_write::<RtcTime>(RTC_NR_ALM_SET);
const RTC_ALM_READ: libc::c_ulong = io_read::<RtcTime>(RTC_NR_ALM_READ);
const RTC_RD_TIME: libc::c_ulong = io_read::<RtcTime>(RTC_NR_RD_TIME);
const RTC_SET_TIME: libc::c_ulong = io_write::<RtcTime>(RTC_NR_SET_TIME);
const RTC_WKALM_SET: libc::c_ulong = io_write::<RtcWakeAlarm>(RTC_NR_WKALM_SET);
const RTC_WKALM_RD: libc::c_ulong = io_read::<RtcWakeAlarm>(RTC_NR_WKALM_RD);

fn to_c_int(value: u32) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

impl RtcTime {
    fn from_timestamp(timestamp: u64) -> RtcResult<Self> {
        let secs = i64::try_from(timestamp)
            .map_err(|e| RtcError::invalid_time(format!("{timestamp}: {e}")))?;
        let dt: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| RtcError::invalid_time(format!("{timestamp} is out of range")))?;
        Ok(Self {
            tm_sec: to_c_int(dt.second()),
            tm_min: to_c_int(dt.minute()),
            tm_hour: to_c_int(dt.hour()),
            tm_mday: to_c_int(dt.day()),
            tm_mon: to_c_int(dt.month0()),
            tm_year: dt.year().saturating_sub(1900),
            tm_wday: to_c_int(dt.weekday().num_days_from_sunday()),
            tm_yday: to_c_int(dt.ordinal0()),
            tm_isdst: 0,
        })
    }

    /// Time-of-day alarms read back with the date fields set to -1.
    fn has_date(&self) -> bool {
        self.tm_mday >= 1 && self.tm_mon >= 0 && self.tm_year >= 0
    }

    fn to_timestamp(self) -> RtcResult<u64> {
        let invalid = || RtcError::invalid_time(format!("{self:?}"));
        let field = |v: c_int| {
            u32::try_from(v).map_err(|e| RtcError::invalid_time(format!("{self:?}: {e}")))
        };
        let date = NaiveDate::from_ymd_opt(
            self.tm_year.checked_add(1900).ok_or_else(invalid)?,
            field(self.tm_mon)?.checked_add(1).ok_or_else(invalid)?,
            field(self.tm_mday)?,
        )
        .ok_or_else(invalid)?;
        let datetime = date
            .and_hms_opt(
                field(self.tm_hour)?,
                field(self.tm_min)?,
                field(self.tm_sec)?,
            )
            .ok_or_else(invalid)?;
        u64::try_from(datetime.and_utc().timestamp())
            .map_err(|e| RtcError::invalid_time(format!("{self:?}: {e}")))
    }
}

/// A time-of-day alarm fires at its next occurrence strictly after `now`.
fn next_alarm_occurrence(alarm: RtcTime, now: RtcTime) -> RtcResult<u64> {
    let today = RtcTime {
        tm_mday: now.tm_mday,
        tm_mon: now.tm_mon,
        tm_year: now.tm_year,
        ..alarm
    };
    let candidate = today.to_timestamp()?;
    if candidate <= now.to_timestamp()? {
        Ok(candidate.saturating_add(SECONDS_PER_DAY))
    } else {
        Ok(candidate)
    }
}

/// Kernel RTC device.
#[derive(Debug)]
pub struct LinuxRtc {
    device: File,
    path: PathBuf,
    profile: HardwareProfile,
}

impl LinuxRtc {
    /// Open the RTC device at `path` for the given profile.
    ///
    /// # Errors
    ///
    /// Returns [`RtcError::Unsupported`] for [`HardwareProfile::NoRtc`] and
    /// [`RtcError::Open`] if the device cannot be opened.
    pub fn open(path: impl AsRef<Path>, profile: HardwareProfile) -> RtcResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !profile.has_rtc_device() {
            return Err(RtcError::unsupported("opening an RTC device", profile));
        }
        let device = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(&path)
            .map_err(|source| RtcError::Open {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), %profile, "RTC device opened");
        Ok(Self {
            device,
            path,
            profile,
        })
    }

    /// Device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn uses_wake_alarm(&self) -> bool {
        self.profile != HardwareProfile::SameDayAlarmOnly
    }

    fn ioctl_error(request: &'static str) -> RtcError {
        RtcError::Ioctl {
            request,
            source: io::Error::last_os_error(),
        }
    }

    fn ioctl_flag(&self, request: libc::c_ulong, name: &'static str) -> RtcResult<()> {
        // SAFETY: `request` is an argument-less RTC request on an open RTC
        // descriptor; the kernel ignores the third argument.
        let rc = unsafe { libc::ioctl(self.device.as_raw_fd(), request as _, 0) };
        if rc < 0 {
            return Err(Self::ioctl_error(name));
        }
        trace!(request = name, "RTC ioctl");
        Ok(())
    }

    fn ioctl_read<T: Default>(&self, request: libc::c_ulong, name: &'static str) -> RtcResult<T> {
        let mut value = T::default();
        // SAFETY: `request` encodes `size_of::<T>()` and the kernel writes at
        // most that many bytes into `value`, a live, writable `repr(C)` value.
        let rc = unsafe {
            libc::ioctl(
                self.device.as_raw_fd(),
                request as _,
                std::ptr::from_mut(&mut value),
            )
        };
        if rc < 0 {
            return Err(Self::ioctl_error(name));
        }
        trace!(request = name, "RTC ioctl");
        Ok(value)
    }

    fn ioctl_write<T>(&self, request: libc::c_ulong, name: &'static str, value: &T) -> RtcResult<()> {
        // SAFETY: `request` encodes `size_of::<T>()` and the kernel only reads
        // that many bytes from `value`, which outlives the call.
        let rc = unsafe {
            libc::ioctl(
                self.device.as_raw_fd(),
                request as _,
                std::ptr::from_ref(value),
            )
        };
        if rc < 0 {
            return Err(Self::ioctl_error(name));
        }
        trace!(request = name, "RTC ioctl");
        Ok(())
    }
}

impl RtcClock for LinuxRtc {
    fn profile(&self) -> HardwareProfile {
        self.profile
    }

    fn now(&self) -> RtcResult<u64> {
        self.ioctl_read::<RtcTime>(RTC_RD_TIME, "RTC_RD_TIME")?
            .to_timestamp()
    }

    fn set_time(&mut self, timestamp: u64) -> RtcResult<()> {
        let tm = RtcTime::from_timestamp(timestamp)?;
        self.ioctl_write(RTC_SET_TIME, "RTC_SET_TIME", &tm)?;
        debug!(timestamp, "RTC time set");
        Ok(())
    }

    fn set_alarm(&mut self, timestamp: u64) -> RtcResult<()> {
        let time = RtcTime::from_timestamp(timestamp)?;
        if self.uses_wake_alarm() {
            let alarm = RtcWakeAlarm {
                enabled: 0,
                pending: 0,
                time,
            };
            self.ioctl_write(RTC_WKALM_SET, "RTC_WKALM_SET", &alarm)?;
        } else {
            self.ioctl_write(RTC_ALM_SET, "RTC_ALM_SET", &time)?;
        }
        debug!(timestamp, "RTC alarm programmed");
        Ok(())
    }

    fn read_alarm(&self) -> RtcResult<u64> {
        let alarm = if self.uses_wake_alarm() {
            self.ioctl_read::<RtcWakeAlarm>(RTC_WKALM_RD, "RTC_WKALM_RD")?
                .time
        } else {
            self.ioctl_read::<RtcTime>(RTC_ALM_READ, "RTC_ALM_READ")?
        };
        if alarm.has_date() {
            return alarm.to_timestamp();
        }
        let now = self.ioctl_read::<RtcTime>(RTC_RD_TIME, "RTC_RD_TIME")?;
        next_alarm_occurrence(alarm, now)
    }

    fn enable_alarm_interrupt(&mut self, enabled: bool) -> RtcResult<()> {
        if enabled {
            self.ioctl_flag(RTC_AIE_ON, "RTC_AIE_ON")
        } else {
            self.ioctl_flag(RTC_AIE_OFF, "RTC_AIE_OFF")
        }
    }

    fn alarm_fd(&self) -> Option<BorrowedFd<'_>> {
        Some(self.device.as_fd())
    }

    fn acknowledge_alarm(&mut self) -> RtcResult<()> {
        let mut record = [0u8; std::mem::size_of::<libc::c_ulong>()];
        match (&self.device).read(&mut record) {
            Ok(_) => {
                let data = libc::c_ulong::from_ne_bytes(record);
                debug!(flags = data & 0xff, count = data >> 8, "RTC interrupt acknowledged");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(source) => Err(RtcError::Device {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
