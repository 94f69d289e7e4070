//! atctl - control tool for the atd job daemon

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atd_daemon::trigger::{request_resync, request_wake};
use atd_spool::{JobId, JobStore};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "atctl")]
#[command(about = "Queue jobs for atd and poke the running daemon")]
#[command(version)]
struct Cli {
    /// Spool directory the daemon serves
    spool_dir: PathBuf,

    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make the daemon rescan the spool now
    Wake,
    /// Make the daemon copy the system time into the RTC
    Resync,
    /// Show queued jobs
    List,
    /// Queue a script to run at a given time
    Submit {
        /// Due time, seconds since the epoch
        #[arg(long)]
        at: u64,
        /// Executable script to queue
        script: PathBuf,
    },
}

#[derive(Serialize)]
struct JobEntry {
    due: u64,
    origin_pid: u32,
    path: PathBuf,
}

fn list(spool_dir: &Path, json: bool) -> Result<()> {
    let store = JobStore::open(spool_dir)?;
    let entries: Vec<JobEntry> = store
        .list()?
        .into_iter()
        .map(|job| JobEntry {
            due: job.id.due,
            origin_pid: job.id.origin_pid,
            path: job.path,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("no jobs queued");
    } else {
        for entry in &entries {
            println!("{:>12}  {:>7}  {}", entry.due, entry.origin_pid, entry.path.display());
        }
    }
    Ok(())
}

fn submit(spool_dir: &Path, at: u64, script: &Path) -> Result<()> {
    let contents =
        fs::read(script).with_context(|| format!("failed to read {}", script.display()))?;
    let store = JobStore::open(spool_dir)?;
    let job = store.submit(JobId::new(at, std::process::id()), &contents)?;
    println!("{}", job.path.display());

    // A job earlier than the daemon's current sleep needs a rescan.
    if let Err(e) = request_wake(spool_dir) {
        warn!(error = %e, "job queued but the daemon could not be woken");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("atctl={log_level},atd_spool={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    debug!(spool = %cli.spool_dir.display(), "atctl starting");
    match cli.command {
        Commands::Wake => request_wake(&cli.spool_dir)
            .with_context(|| format!("failed to wake daemon in {}", cli.spool_dir.display())),
        Commands::Resync => request_resync(&cli.spool_dir)
            .with_context(|| format!("failed to request resync in {}", cli.spool_dir.display())),
        Commands::List => list(&cli.spool_dir, cli.json),
        Commands::Submit { at, ref script } => submit(&cli.spool_dir, at, script),
    }
}
