//! Engine context: the flags that steer the tick context, in one place.
//!
//! Reset from configuration at init and afterwards mutated only through the
//! control operations on [`Stepper`](crate::Stepper). The tick context reads
//! them every tick; the only flag it writes is the homing-leg completion.

use crate::babystep::BabystepRequests;
use crate::diagnostics::FaultCounters;
use crate::position::PositionTracker;
use crate::queue::BlockQueue;
use crate::safety::hits::HitRecord;
use crate::safety::stop::StopSignal;
use pulse_common::axis::{Axis, DualMotor};
use pulse_common::machine::StepperConfig;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug)]
pub struct EngineContext {
    endstops_enabled: AtomicBool,
    abort_on_hit: AtomicBool,
    homing: AtomicBool,
    homing_leg_done: AtomicBool,
    /// Bit per [`DualMotor`] of the dual-endstop axis.
    locked_motors: AtomicU8,
    dual_axis: Option<Axis>,
}

impl EngineContext {
    pub fn from_config(config: &StepperConfig) -> Self {
        Self {
            endstops_enabled: AtomicBool::new(config.endstops.enabled),
            abort_on_hit: AtomicBool::new(config.endstops.abort_on_hit),
            homing: AtomicBool::new(false),
            homing_leg_done: AtomicBool::new(false),
            locked_motors: AtomicU8::new(0),
            dual_axis: config.endstops.dual_axis,
        }
    }

    #[inline]
    pub fn endstops_enabled(&self) -> bool {
        self.endstops_enabled.load(Ordering::Acquire)
    }

    pub fn set_endstops_enabled(&self, enabled: bool) {
        self.endstops_enabled.store(enabled, Ordering::Release);
    }

    #[inline]
    pub fn abort_on_hit(&self) -> bool {
        self.abort_on_hit.load(Ordering::Acquire)
    }

    pub fn set_abort_on_hit(&self, abort: bool) {
        self.abort_on_hit.store(abort, Ordering::Release);
    }

    #[inline]
    pub fn homing(&self) -> bool {
        self.homing.load(Ordering::Acquire)
    }

    /// Entering or leaving homing clears the leg-complete flag.
    pub fn set_homing(&self, homing: bool) {
        self.homing_leg_done.store(false, Ordering::Release);
        self.homing.store(homing, Ordering::Release);
    }

    pub(crate) fn mark_homing_leg_done(&self) {
        self.homing_leg_done.store(true, Ordering::Release);
    }

    /// Consume the homing-leg completion signal.
    pub fn take_homing_leg_done(&self) -> bool {
        self.homing_leg_done.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_locked(&self, motor: DualMotor) -> bool {
        self.locked_motors.load(Ordering::Acquire) & (1 << motor.index()) != 0
    }

    /// Lock bits, one per [`DualMotor`].
    #[inline]
    pub fn locked_mask(&self) -> u8 {
        self.locked_motors.load(Ordering::Acquire)
    }

    /// Both motors of the dual axis are locked.
    #[inline]
    pub fn both_locked(&self) -> bool {
        self.locked_motors.load(Ordering::Acquire) & 0b11 == 0b11
    }

    pub fn set_locked(&self, motor: DualMotor, locked: bool) {
        let bit = 1 << motor.index();
        if locked {
            self.locked_motors.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.locked_motors.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    #[inline]
    pub fn dual_axis(&self) -> Option<Axis> {
        self.dual_axis
    }
}

/// Everything both contexts touch.
#[derive(Debug)]
pub(crate) struct Shared {
    pub context: EngineContext,
    pub position: PositionTracker,
    pub queue: BlockQueue,
    pub stop: StopSignal,
    pub hits: HitRecord,
    pub faults: FaultCounters,
    pub babysteps: BabystepRequests,
}

impl Shared {
    pub fn new(config: &StepperConfig) -> Self {
        Self {
            context: EngineContext::from_config(config),
            position: PositionTracker::new(),
            queue: BlockQueue::new(),
            stop: StopSignal::new(),
            hits: HitRecord::new(),
            faults: FaultCounters::new(),
            babysteps: BabystepRequests::new(),
        }
    }
}
