//! # Pulse Simulator
//!
//! Runs the pulse stepper engine against simulated hardware: recording step
//! ports, position-driven limit switches, a driver register model and a
//! tick thread standing in for the hardware timer.
//!
//! A [`Simulation`] owns the producer side. Jobs ([`job::Job`]) are executed
//! step by step on the calling thread while the tick thread drives motion.

pub mod config;
pub mod error;
pub mod hardware;
pub mod job;
pub mod runner;

use config::SimConfig;
use error::SimError;
use hardware::{SimDrivers, SimEndstops, SimTickSource};
use job::{Job, JobStep};
use pulse_common::axis::{Axis, AxisArray, Motor};
use pulse_stepper::{
    EndstopReport, PortLogs, PortTable, Stepper, StepperError, StepperFaults, init,
};
use runner::{RunnerSettings, TickRunner, TickStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Producer back-off while waiting on the tick thread.
const PRODUCER_POLL: Duration = Duration::from_micros(200);

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub positions: AxisArray<i32>,
    pub positions_mm: AxisArray<f64>,
    /// Pulses seen by each installed motor.
    pub pulses: Vec<(Motor, u32)>,
    pub faults: StepperFaults,
    pub hits: Option<EndstopReport>,
    pub stats: TickStats,
    pub driver_writes: u32,
}

pub struct Simulation {
    stepper: Stepper,
    runner: TickRunner,
    drivers: SimDrivers,
    logs: PortLogs,
    cancelled: Arc<AtomicBool>,
}

impl Simulation {
    /// Build the engine on simulated hardware and start the tick thread.
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        let (ports, logs) = PortTable::recording();
        let endstops = SimEndstops::new(&config.sim.switches, &config.machine, &logs);
        let source = Arc::new(SimTickSource::new());
        let (stepper, tick) = init(&config.machine, ports, Box::new(endstops), source.clone())?;

        let mut drivers = SimDrivers::new();
        stepper.init_drivers(&mut drivers)?;

        let runner = TickRunner::spawn(
            tick,
            source,
            RunnerSettings {
                timer_hz: config.machine.timer.frequency_hz,
                time_scale: config.sim.time_scale,
                cpu_core: config.sim.cpu_core,
            },
        )?;
        info!(service = %config.shared.service_name, "simulation ready");
        Ok(Self {
            stepper,
            runner,
            drivers,
            logs,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    pub fn drivers(&self) -> &SimDrivers {
        &self.drivers
    }

    pub fn logs(&self) -> &PortLogs {
        &self.logs
    }

    /// Setting this flag stops [`run_job`](Self::run_job) before its next
    /// step. Pair it with a quick stop to also drop queued motion.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Execute every step of `job` in order. Returns the number of steps
    /// executed.
    pub fn run_job(&mut self, job: &Job) -> Result<usize, SimError> {
        info!(job = %job.name, steps = job.steps.len(), moves = job.move_count(), "job started");
        for (index, step) in job.steps.iter().enumerate() {
            if self.cancelled.load(Ordering::Acquire) {
                warn!(job = %job.name, index, "job cancelled");
                return Ok(index);
            }
            self.execute(step)
                .map_err(|source| SimError::JobStep { index, source })?;
        }
        info!(job = %job.name, "job finished");
        Ok(job.steps.len())
    }

    /// Execute one operation on the producer side.
    pub fn execute(&mut self, step: &JobStep) -> Result<(), StepperError> {
        debug!(?step, "job step");
        let stepper = &self.stepper;
        match step {
            JobStep::Move(spec) => {
                stepper.push_spec_with(spec.clone(), || std::thread::sleep(PRODUCER_POLL))?;
            }
            JobStep::Sync => self.synchronize(),
            JobStep::SetPosition { x, y, z, e } => {
                self.synchronize();
                stepper.set_position(*x, *y, *z, *e)?;
            }
            JobStep::EnableEndstops { enabled } => stepper.enable_endstops(*enabled),
            JobStep::Homing { enabled } => stepper.set_homing_in_progress(*enabled),
            JobStep::LockMotor { motor, locked } => stepper.lock_axis_motor(*motor, *locked),
            JobStep::AckEndstops => stepper.endstops_hit_on_purpose(),
            JobStep::Babystep { axis, forward } => stepper.babystep(*axis, *forward)?,
            JobStep::QuickStop => stepper.quick_stop(),
        }
        Ok(())
    }

    /// Wait for the queue to drain without spinning the producer core.
    pub fn synchronize(&self) {
        self.stepper
            .synchronize_with(|| std::thread::sleep(PRODUCER_POLL));
    }

    /// Drain, de-energize the motors, stop the tick thread and collect the
    /// final state.
    pub fn finish(mut self) -> Result<SimReport, SimError> {
        self.synchronize();
        self.stepper.finish_and_disable(&mut self.drivers);
        let stats = self.runner.stop()?;

        let positions = self.stepper.positions();
        let positions_mm = Axis::ALL.map(|axis| self.stepper.axis_position_mm(axis));
        let pulses = self
            .stepper
            .motors()
            .iter()
            .map(|&motor| (motor, self.logs.get(motor).steps()))
            .collect();
        let hits = self.stepper.check_hit_endstops();
        let faults = self.stepper.check_stepper_errors();

        Ok(SimReport {
            positions,
            positions_mm,
            pulses,
            faults,
            hits,
            stats,
            driver_writes: self.drivers.writes(),
        })
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("stepper", &self.stepper)
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
