//! End-to-end passes with real job scripts, the real runner and the real
//! trigger FIFO.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use atd_daemon::trigger::{request_resync, request_wake};
use atd_daemon::{
    EXEC_FAILURE_STATUS, JobLauncher, JobRunner, Scheduler, WakeEvent, WakeTrigger,
};
use atd_rtc::{HardwareProfile, RtcClock, RtcOp, SimulatedRtc};
use atd_spool::{JobId, JobStore};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const NOW: u64 = 1_700_000_000;

fn write_job(dir: &Path, name: &str, body: &str) -> std::io::Result<()> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
}

fn scheduler(
    dir: &Path,
    profile: HardwareProfile,
) -> Result<(SimulatedRtc, Scheduler<SimulatedRtc, WakeTrigger>), atd_daemon::AtdError> {
    let handle = SimulatedRtc::new(profile, NOW);
    let trigger = WakeTrigger::create(dir)?;
    let scheduler = Scheduler::new(handle.clone(), JobStore::new(dir), trigger)
        .with_max_sleep(Duration::from_millis(50));
    Ok((handle, scheduler))
}

#[test]
fn self_deleting_job_runs_once() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_job(dir.path(), "1700000000.1", r#"rm -f "$0""#)?;
    let (_rtc, mut scheduler) = scheduler(dir.path(), HardwareProfile::Standard)?;

    let report = scheduler.run_once()?;
    assert_eq!(report.ran.len(), 1);
    assert!(report.ran[0].status.success());
    assert!(!dir.path().join("1700000000.1").exists());
    assert_eq!(report.next, None);
    assert_eq!(report.alarm, None);

    let report = scheduler.run_once()?;
    assert!(report.ran.is_empty());
    Ok(())
}

#[test]
fn rescheduled_job_is_seen_by_the_same_pass() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_job(
        dir.path(),
        "1700000000.7",
        r#"mv "$0" "$(dirname "$0")/1700003600.7""#,
    )?;
    let (rtc, mut scheduler) = scheduler(dir.path(), HardwareProfile::Standard)?;

    let report = scheduler.run_once()?;

    assert_eq!(report.ran.len(), 1);
    assert_eq!(report.next, Some(1_700_003_600));
    assert_eq!(report.alarm, Some(1_700_003_600));
    assert_eq!(rtc.alarm(), Some(1_700_003_600));
    Ok(())
}

#[test]
fn jobs_due_in_the_same_second_all_run_before_rescheduling() -> TestResult {
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("ran.log");
    let log_str = log.display().to_string();
    write_job(dir.path(), "1700000000.1", &format!(r#"echo one >> "{log_str}"; rm -f "$0""#))?;
    write_job(dir.path(), "1700000000.2", &format!(r#"echo two >> "{log_str}"; rm -f "$0""#))?;
    write_job(dir.path(), "1700000600.3", "exit 0")?;
    let (_rtc, mut scheduler) = scheduler(dir.path(), HardwareProfile::Standard)?;

    let report = scheduler.run_once()?;

    let mut ran: Vec<JobId> = report.ran.iter().map(|outcome| outcome.id).collect();
    ran.sort();
    assert_eq!(ran, vec![JobId::new(NOW, 1), JobId::new(NOW, 2)]);
    let mut lines: Vec<String> = fs::read_to_string(&log)?.lines().map(str::to_owned).collect();
    lines.sort();
    assert_eq!(lines, vec!["one", "two"]);
    assert_eq!(report.next, Some(1_700_000_600));
    Ok(())
}

#[test]
fn same_day_hardware_clamps_late_job() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_job(dir.path(), "1700010000.4", "exit 0")?;
    let (rtc, mut scheduler) = scheduler(dir.path(), HardwareProfile::SameDayAlarmOnly)?;

    let report = scheduler.run_once()?;

    assert!(report.ran.is_empty());
    assert_eq!(report.next, Some(1_700_010_000));
    assert_eq!(report.alarm, Some(1_700_006_399));
    assert_eq!(rtc.alarm(), Some(1_700_006_399));
    Ok(())
}

#[test]
fn trigger_wakes_the_loop_and_resyncs() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (rtc, scheduler) = scheduler(dir.path(), HardwareProfile::Standard)?;
    let mut scheduler = scheduler.with_wall_clock(|| NOW + 42);

    request_wake(dir.path())?;
    let report = scheduler.run_once()?;
    assert_eq!(report.event, WakeEvent::Trigger(b"\n".to_vec()));
    assert!(!report.resynced);

    request_resync(dir.path())?;
    let report = scheduler.run_once()?;
    assert!(report.resynced);
    assert!(rtc.ops().contains(&RtcOp::SetTime(NOW + 42)));
    assert_eq!(rtc.now()?, NOW + 42);

    let report = scheduler.run_once()?;
    assert_eq!(report.event, WakeEvent::Timeout);
    Ok(())
}

#[test]
fn runner_reports_exit_status() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_job(dir.path(), "1700000000.1", "exit 3")?;
    let status = JobRunner::new().run(&dir.path().join("1700000000.1"))?;
    assert_eq!(status.code(), Some(3));
    assert!(dir.path().join("1700000000.1").exists());
    Ok(())
}

#[test]
fn runner_passes_no_arguments() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_job(dir.path(), "1700000000.1", r#"exit "$#""#)?;
    let status = JobRunner::new().run(&dir.path().join("1700000000.1"))?;
    assert_eq!(status.code(), Some(0));
    Ok(())
}

#[test]
fn unexecutable_jobs_report_127() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut runner = JobRunner::new();

    let not_executable = dir.path().join("1700000000.1");
    fs::write(&not_executable, "#!/bin/sh\nexit 0\n")?;
    fs::set_permissions(&not_executable, fs::Permissions::from_mode(0o644))?;
    assert_eq!(runner.run(&not_executable)?.code(), Some(EXEC_FAILURE_STATUS));

    write_job(dir.path(), "1700000000.2", "exit 0")?;
    let bad_interpreter = dir.path().join("1700000000.2");
    fs::write(&bad_interpreter, "#!/nonexistent/interpreter\n")?;
    assert_eq!(runner.run(&bad_interpreter)?.code(), Some(EXEC_FAILURE_STATUS));

    let missing = dir.path().join("1700000000.3");
    assert_eq!(runner.run(&missing)?.code(), Some(EXEC_FAILURE_STATUS));
    Ok(())
}
