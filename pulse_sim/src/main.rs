//! # Pulse Simulator Binary
//!
//! Runs a job file through the stepper engine on simulated hardware and
//! logs the final positions, switch hits and fault counters.
//!
//! # Usage
//!
//! ```bash
//! pulse_sim --config config/machine.toml --job config/jobs/square.toml
//!
//! # Verbose logging, JSON output
//! pulse_sim -c config/machine.toml -j config/jobs/home_x.toml -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use pulse_common::config::{ConfigLoader, LogLevel};
use pulse_sim::config::SimConfig;
use pulse_sim::job::Job;
use pulse_sim::Simulation;
use pulse_stepper::Phase;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pulse Simulator - stepper engine on simulated step/dir hardware
#[derive(Parser, Debug)]
#[command(name = "pulse_sim")]
#[command(version)]
#[command(about = "Run a motion job through the stepper engine on simulated hardware")]
#[command(long_about = None)]
struct Args {
    /// Machine + simulator configuration (TOML).
    #[arg(short, long, default_value = "config/machine.toml")]
    config: PathBuf,

    /// Job file to execute (TOML).
    #[arg(short, long)]
    job: PathBuf,

    /// Enable verbose logging (overrides shared.log_level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match SimConfig::load_validated(&args.config) {
        Ok(config) => config,
        Err(e) => {
            // no configured level yet; install the default so the error is seen
            setup_tracing(&args, LogLevel::default());
            return Err(e.into());
        }
    };

    setup_tracing(&args, config.shared.log_level);
    info!("Pulse Simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    let job = Job::load(&args.job)?;
    info!("Loaded job '{}' ({} steps) from {}", job.name, job.steps.len(), args.job.display());

    let mut sim = Simulation::new(&config)?;

    // Ctrl-C drops queued motion and skips the rest of the job.
    let cancelled = sim.cancel_flag();
    let stop = sim.stepper().quick_stop_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        cancelled.store(true, Ordering::SeqCst);
        stop.trigger();
    })?;

    let executed = sim.run_job(&job)?;
    let report = sim.finish()?;

    info!(executed, "job complete");
    for (axis, (steps, mm)) in ["X", "Y", "Z", "E"]
        .iter()
        .zip(report.positions.iter().zip(report.positions_mm.iter()))
    {
        info!("{axis}: {steps} steps ({mm:.3} mm)");
    }
    for (motor, pulses) in &report.pulses {
        info!("{motor}: {pulses} pulses");
    }
    info!(
        accelerating = report.stats.phases.get(Phase::Accelerating),
        cruising = report.stats.phases.get(Phase::Cruising),
        decelerating = report.stats.phases.get(Phase::Decelerating),
        "step events by phase"
    );
    info!(
        ticks = report.stats.ticks,
        overruns = report.stats.overruns,
        max_body_ns = report.stats.max_body_ns,
        avg_body_ns = report.stats.avg_body_ns(),
        driver_writes = report.driver_writes,
        "tick statistics"
    );
    if let Some(hits) = &report.hits {
        warn!("{hits}");
    }
    info!("faults: {}", report.faults);
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
