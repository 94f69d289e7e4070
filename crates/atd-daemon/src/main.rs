//! atd - RTC-backed one-shot job daemon

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::{env, process};

use atd_daemon::config::{self, ConfigOverrides};
use atd_daemon::{
    AtdError, ConfigError, DaemonConfig, LoggingConfig, Scheduler, WakeTrigger, init_logging,
    open_clock,
};
use atd_rtc::HardwareProfile;
use atd_spool::JobStore;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "atd")]
#[command(about = "Run one-shot jobs from a spool directory at their due time")]
#[command(version)]
struct Cli {
    /// Spool directory holding `<due>.<pid>` job files and the trigger FIFO
    spool_dir: PathBuf,

    /// Hardware profile: standard, buggy-select, no-rtc or same-day-alarm-only
    #[arg(long, env = "ATD_PROFILE")]
    profile: Option<HardwareProfile>,

    /// Kernel RTC device
    #[arg(long)]
    rtc_device: Option<PathBuf>,

    /// Register pseudo-file holding the clock counter (no-rtc profile)
    #[arg(long)]
    register_file: Option<PathBuf>,

    /// Longest single sleep, in seconds
    #[arg(long)]
    max_sleep_secs: Option<u64>,

    /// Log to syslog instead of stderr
    #[arg(long)]
    syslog: bool,

    /// JSON configuration file
    #[arg(long, env = "ATD_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            profile: self.profile,
            rtc_device: self.rtc_device.clone(),
            register_file: self.register_file.clone(),
            max_sleep_secs: self.max_sleep_secs,
            syslog: self.syslog,
        }
    }
}

fn serve(spool_dir: &Path, config: &DaemonConfig) -> Result<Infallible, AtdError> {
    // Paths on the command line are relative to where we were started.
    let config = config.clone().with_absolute_paths()?;

    env::set_current_dir(spool_dir).map_err(|source| ConfigError::SpoolDir {
        path: spool_dir.to_path_buf(),
        source,
    })?;
    let here = Path::new(".");
    let store = JobStore::open(here)?;
    let trigger = WakeTrigger::create(here)?;
    let rtc = open_clock(&config)?;

    Scheduler::new(rtc, store, trigger)
        .with_max_sleep(config.max_sleep())
        .run()
}

fn main() {
    let cli = Cli::parse();

    let config = match config::resolve(cli.config.as_deref(), cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            let err = AtdError::from(e);
            eprintln!("atd: {err}");
            process::exit(err.exit_code());
        }
    };

    if let Err(err) = init_logging(LoggingConfig::with_verbosity(config.log_backend, cli.verbose)) {
        eprintln!("atd: {err}");
        process::exit(err.exit_code());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        profile = %config.profile,
        spool = %cli.spool_dir.display(),
        "starting atd"
    );

    match serve(&cli.spool_dir, &config) {
        Ok(never) => match never {},
        Err(err) => {
            error!(error = %err, "fatal error, exiting");
            process::exit(err.exit_code());
        }
    }
}
