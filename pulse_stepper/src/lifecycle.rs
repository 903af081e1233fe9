//! Lifecycle Controller: init, start/wake/sleep, synchronize, and every
//! producer-side control operation.
//!
//! [`init`] splits the engine into its two halves: a [`Stepper`] for the
//! producer context and a [`TickContext`] for whatever drives the step
//! timer. They share only atomics and the lock-free block queue.

use crate::context::{EngineContext, Shared};
use crate::diagnostics::StepperFaults;
use crate::driver::{self, DriverControl, MicrostepReadings};
use crate::error::StepperError;
use crate::port::PortTable;
use crate::queue::BlockQueue;
use crate::safety::endstops::EndstopInputs;
use crate::safety::hits::EndstopReport;
use crate::safety::stop::QuickStopHandle;
use crate::tick::TickContext;
use pulse_common::axis::{Axis, AxisArray, DualMotor, Motor};
use pulse_common::block::{Block, BlockSpec};
use pulse_common::consts::MOTOR_SLOTS;
use pulse_common::machine::{MicrostepMode, StepperConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info, warn};

// ─── Tick Source ────────────────────────────────────────────────────

/// The periodic timer that runs [`TickContext::tick`].
///
/// Arming starts (or keeps) ticks coming; disarming lets the engine sleep.
/// Both are called from either context and must be idempotent.
pub trait TickSource: Send + Sync {
    fn arm(&self);
    fn disarm(&self);
    fn is_armed(&self) -> bool;
}

/// A tick source that only records its armed state. The owner calls
/// [`TickContext::tick`] by hand.
#[derive(Debug, Default)]
pub struct ManualTickSource {
    armed: AtomicBool,
    arms: AtomicU32,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `arm` calls so far.
    pub fn arm_count(&self) -> u32 {
        self.arms.load(Ordering::Relaxed)
    }
}

impl TickSource for ManualTickSource {
    fn arm(&self) {
        self.arms.fetch_add(1, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

// ─── Init ───────────────────────────────────────────────────────────

/// Build the engine: validate configuration, program port polarity, reset
/// outputs, and arm the tick source with an empty queue.
pub fn init(
    config: &StepperConfig,
    mut ports: PortTable,
    endstops: Box<dyn EndstopInputs>,
    tick_source: Arc<dyn TickSource>,
) -> Result<(Stepper, TickContext), StepperError> {
    crate::config::validate(config)?;
    if let Some(motor) = ports.missing(config) {
        return Err(StepperError::MissingPort(motor));
    }
    ports.configure(config);
    ports.reset();

    let motors = ports.installed();
    let shared = Arc::new(Shared::new(config));
    let tick = TickContext::new(config, shared.clone(), tick_source.clone(), ports, endstops);
    let stepper = Stepper {
        shared,
        tick_source,
        steps_per_mm: Axis::ALL.map(|axis| config.steps_per_mm(axis)),
        extruders: config.extruders.count,
        config: config.clone(),
        motors,
    };
    stepper.start();

    info!(
        motors = stepper.motors.len(),
        extruders = stepper.extruders,
        endstops = config.endstops.enabled,
        timer_hz = config.timer.frequency_hz,
        "stepper initialized"
    );
    Ok((stepper, tick))
}

// ─── Stepper ────────────────────────────────────────────────────────

/// Producer-side handle to the engine.
pub struct Stepper {
    shared: Arc<Shared>,
    tick_source: Arc<dyn TickSource>,
    config: StepperConfig,
    steps_per_mm: AxisArray<f64>,
    extruders: u8,
    motors: heapless::Vec<Motor, MOTOR_SLOTS>,
}

impl Stepper {
    /// Arm the tick source. Idempotent.
    pub fn start(&self) {
        self.tick_source.arm();
    }

    /// Re-arm after the engine put itself to sleep on an empty queue.
    #[inline]
    pub fn wake(&self) {
        self.tick_source.arm();
    }

    /// Wait until every queued block has executed. Yields the thread while
    /// waiting; ticks must be driven elsewhere.
    pub fn synchronize(&self) {
        self.synchronize_with(std::thread::yield_now);
    }

    /// Wait until every queued block has executed, running `idle` between
    /// checks. Returns immediately when already drained.
    pub fn synchronize_with(&self, mut idle: impl FnMut()) {
        while !self.shared.queue.is_drained() {
            idle();
        }
    }

    // ─── Enqueue ────────────────────────────────────────────────────

    /// Enqueue an admitted block and wake the engine. Fails fast when the
    /// queue is full. Returns the block's sequence number.
    pub fn push_block(&self, block: Block) -> Result<u64, StepperError> {
        let extruder = block.active_extruder();
        if extruder >= self.extruders {
            self.shared.faults.record_rejected_block();
            warn!(extruder, installed = self.extruders, "block rejected: extruder not installed");
            return Err(StepperError::ExtruderNotInstalled {
                index: extruder,
                count: self.extruders,
            });
        }
        let seq = self
            .shared
            .queue
            .push(block)
            .map_err(|_| StepperError::QueueFull {
                capacity: BlockQueue::CAPACITY,
            })?;
        debug!(
            seq,
            events = block.step_event_count(),
            dominant = %block.dominant_axis(),
            "block queued"
        );
        self.wake();
        Ok(seq)
    }

    /// Admit and enqueue a planner description.
    pub fn push_spec(&self, spec: BlockSpec) -> Result<u64, StepperError> {
        let block = self.admit(spec)?;
        self.push_block(block)
    }

    /// Admit a planner description, then enqueue it running `idle` while
    /// the queue is full.
    pub fn push_spec_with(&self, spec: BlockSpec, idle: impl FnMut()) -> Result<u64, StepperError> {
        let block = self.admit(spec)?;
        self.push_block_with(block, idle)
    }

    fn admit(&self, spec: BlockSpec) -> Result<Block, StepperError> {
        Ok(Block::try_from(spec).inspect_err(|e| {
            self.shared.faults.record_rejected_block();
            warn!(error = %e, "block rejected");
        })?)
    }

    /// Enqueue, running `idle` while the queue is full.
    pub fn push_block_with(&self, block: Block, mut idle: impl FnMut()) -> Result<u64, StepperError> {
        loop {
            match self.push_block(block) {
                Err(StepperError::QueueFull { .. }) => idle(),
                other => return other,
            }
        }
    }

    /// Blocks queued or executing.
    #[inline]
    pub fn pending_blocks(&self) -> u32 {
        self.shared.queue.pending()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.shared.queue.is_drained()
    }

    // ─── Position ───────────────────────────────────────────────────

    /// Overwrite the step position of all four axes. Rejected while any
    /// block is queued or executing.
    pub fn set_position(&self, x: i32, y: i32, z: i32, e: i32) -> Result<(), StepperError> {
        self.ensure_idle()?;
        self.shared.position.set_all([x, y, z, e]);
        debug!(x, y, z, e, "position set");
        Ok(())
    }

    /// Overwrite the extruder step position only.
    pub fn set_extruder_position(&self, e: i32) -> Result<(), StepperError> {
        self.ensure_idle()?;
        self.shared.position.set(Axis::E, e);
        debug!(e, "extruder position set");
        Ok(())
    }

    #[inline]
    pub fn position(&self, axis: Axis) -> i32 {
        self.shared.position.get(axis)
    }

    pub fn positions(&self) -> AxisArray<i32> {
        self.shared.position.snapshot()
    }

    /// Position in millimetres.
    pub fn axis_position_mm(&self, axis: Axis) -> f64 {
        self.position(axis) as f64 / self.steps_per_mm[axis.index()]
    }

    fn ensure_idle(&self) -> Result<(), StepperError> {
        match self.shared.queue.pending() {
            0 => Ok(()),
            pending => Err(StepperError::Busy { pending }),
        }
    }

    // ─── Safety ─────────────────────────────────────────────────────

    /// Arm or disarm switch sampling.
    pub fn enable_endstops(&self, enabled: bool) {
        self.shared.context.set_endstops_enabled(enabled);
        debug!(enabled, "endstops");
    }

    /// Quick-stop (true) or end-the-block (false) on an unexpected hit.
    pub fn set_abort_on_hit(&self, abort: bool) {
        self.shared.context.set_abort_on_hit(abort);
    }

    /// Abort all queued and executing motion.
    pub fn quick_stop(&self) {
        self.quick_stop_handle().trigger();
        warn!(cutoff = self.shared.stop.cutoff(), "quick stop");
    }

    /// A handle that can raise a quick-stop from any context.
    pub fn quick_stop_handle(&self) -> QuickStopHandle {
        QuickStopHandle::new(self.shared.clone(), self.tick_source.clone())
    }

    /// Report latched switch hits. The record stays until
    /// [`endstops_hit_on_purpose`](Self::endstops_hit_on_purpose).
    pub fn check_hit_endstops(&self) -> Option<EndstopReport> {
        let report = self.shared.hits.report(&self.steps_per_mm)?;
        warn!("{report}");
        Some(report)
    }

    /// Acknowledge latched hits without reporting.
    pub fn endstops_hit_on_purpose(&self) {
        self.shared.hits.clear();
    }

    // ─── Homing ─────────────────────────────────────────────────────

    /// Homing mode halts axes on contact instead of aborting. Leaving it
    /// releases both dual-axis motor locks.
    pub fn set_homing_in_progress(&self, homing: bool) {
        let context = &self.shared.context;
        context.set_homing(homing);
        if !homing {
            context.set_locked(DualMotor::Primary, false);
            context.set_locked(DualMotor::Secondary, false);
        }
        debug!(homing, "homing");
    }

    /// Whether a homing leg reached its switch since the last call.
    pub fn homing_leg_complete(&self) -> bool {
        self.shared.context.take_homing_leg_done()
    }

    /// Suppress pulses to one motor of the dual-endstop axis.
    pub fn lock_axis_motor(&self, motor: DualMotor, locked: bool) {
        self.shared.context.set_locked(motor, locked);
    }

    pub fn context(&self) -> &EngineContext {
        &self.shared.context
    }

    // ─── Babystep ───────────────────────────────────────────────────

    /// Queue one extra step on a linear axis, applied between ticks.
    pub fn babystep(&self, axis: Axis, forward: bool) -> Result<(), StepperError> {
        if axis == Axis::E {
            return Err(StepperError::BabystepAxis(axis));
        }
        self.shared.babysteps.request(axis, forward);
        self.wake();
        Ok(())
    }

    // ─── Diagnostics ────────────────────────────────────────────────

    /// Snapshot of the fault counters; logs a warning when any is non-zero.
    pub fn check_stepper_errors(&self) -> StepperFaults {
        let faults = self.shared.faults.snapshot();
        if !faults.is_clean() {
            warn!(flags = ?faults.flags(), "stepper faults: {faults}");
        }
        faults
    }

    // ─── Drivers ────────────────────────────────────────────────────

    /// Synchronize, then de-energize every installed motor.
    pub fn finish_and_disable(&self, drivers: &mut dyn DriverControl) {
        self.synchronize();
        driver::disable_all(drivers, &self.motors);
        info!(motors = self.motors.len(), "motors disabled");
    }

    /// Apply the configured microstep modes and currents.
    pub fn init_drivers(&self, drivers: &mut dyn DriverControl) -> Result<(), StepperError> {
        driver::microstep_init(drivers, &self.config.drivers);
        driver::digipot_init(drivers, &self.config.drivers)
    }

    /// Select 1, 2, 4, 8 or 16 microsteps.
    pub fn microstep_mode(
        &self,
        drivers: &mut dyn DriverControl,
        motor: Motor,
        divisor: u8,
    ) -> Result<(), StepperError> {
        let mode = MicrostepMode::from_divisor(divisor).ok_or_else(|| StepperError::Driver {
            motor,
            reason: format!("unsupported microstep divisor {divisor}"),
        })?;
        driver::microstep_mode(drivers, motor, mode);
        Ok(())
    }

    pub fn microstep_ms(
        &self,
        drivers: &mut dyn DriverControl,
        motor: Motor,
        ms1: Option<bool>,
        ms2: Option<bool>,
    ) {
        driver::microstep_ms(drivers, motor, ms1, ms2);
    }

    /// MS1/MS2 levels of every installed motor.
    pub fn microstep_readings(&self, drivers: &mut dyn DriverControl) -> MicrostepReadings {
        driver::microstep_readings(drivers, &self.motors)
    }

    pub fn digipot_current(
        &self,
        drivers: &mut dyn DriverControl,
        motor: Motor,
        milliamps: u32,
    ) -> Result<(), StepperError> {
        driver::digipot_current(drivers, motor, milliamps)
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Motors with an installed step port.
    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }
}

impl std::fmt::Debug for Stepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stepper")
            .field("pending", &self.shared.queue.pending())
            .field("position", &self.shared.position.snapshot())
            .field("armed", &self.tick_source.is_armed())
            .finish()
    }
}
