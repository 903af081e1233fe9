//! Limit switch sampling.
//!
//! A switch is sampled only while the current block moves its axis toward
//! it: MIN switches on negative motion, MAX switches on positive motion.
//! Sampling runs every tick a block is loaded, so a trigger suppresses
//! pulses within one tick period.

use crate::context::EngineContext;
use crate::position::PositionTracker;
use crate::safety::hits::HitRecord;
use crate::step::bresenham::AxisMask;
use pulse_common::axis::{Axis, DualMotor};
use pulse_common::block::Block;
use pulse_common::endstop::{Endstop, EndstopSide};
use pulse_common::machine::EndstopConfig;

/// Raw limit switch inputs.
pub trait EndstopInputs: Send {
    /// Pin level of a switch; `true` reads high.
    fn read(&mut self, endstop: Endstop) -> bool;
}

/// No switches wired: every input reads low.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEndstops;

impl EndstopInputs for NullEndstops {
    fn read(&mut self, _endstop: Endstop) -> bool {
        false
    }
}

/// What the tick context must do after sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndstopAction {
    Continue,
    /// Unexpected hit, quick-stop everything.
    Abort,
    /// Unexpected hit, finish only the current block.
    EndBlock,
    /// Homing contact: stop pulsing these axes for the rest of the block.
    Halt(AxisMask),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EndstopMonitor {
    installed: u16,
    inverting: u16,
}

impl EndstopMonitor {
    pub fn new(config: &EndstopConfig) -> Self {
        Self {
            installed: config.installed_mask(),
            inverting: config.inverting_mask(),
        }
    }

    #[inline]
    fn is_installed(&self, endstop: Endstop) -> bool {
        self.installed & endstop.mask() != 0
    }

    /// Triggered switches in the direction of travel, as a switch mask.
    pub fn sample(
        &self,
        inputs: &mut dyn EndstopInputs,
        block: &Block,
        halted: AxisMask,
        dual_axis: Option<Axis>,
    ) -> u16 {
        let mut triggered = 0u16;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            if !block.moves(axis) || halted.contains(AxisMask::for_axis(axis)) {
                continue;
            }
            let side = EndstopSide::toward(block.is_negative(axis));
            let primary = Endstop::new(axis, side);
            let candidates = if dual_axis == Some(axis) {
                [Some(primary), Some(Endstop::secondary(axis, side))]
            } else {
                [Some(primary), None]
            };
            for endstop in candidates.into_iter().flatten() {
                if !self.is_installed(endstop) {
                    continue;
                }
                let level = inputs.read(endstop);
                let inverting = self.inverting & endstop.mask() != 0;
                if level != inverting {
                    triggered |= endstop.mask();
                }
            }
        }
        triggered
    }

    /// Latch hits and decide the reaction to a non-empty trigger mask.
    pub fn react(
        &self,
        triggered: u16,
        context: &EngineContext,
        position: &PositionTracker,
        hits: &HitRecord,
    ) -> EndstopAction {
        if triggered == 0 {
            return EndstopAction::Continue;
        }
        for index in 0..Endstop::COUNT {
            if triggered & (1 << index) == 0 {
                continue;
            }
            if let Some(endstop) = Endstop::from_index(index) {
                hits.record(endstop, position.get(endstop.axis));
            }
        }

        if !context.homing() {
            return if context.abort_on_hit() {
                EndstopAction::Abort
            } else {
                EndstopAction::EndBlock
            };
        }

        let mut halt = AxisMask::empty();
        for index in 0..Endstop::COUNT {
            if triggered & (1 << index) == 0 {
                continue;
            }
            let Some(endstop) = Endstop::from_index(index) else {
                continue;
            };
            if context.dual_axis() == Some(endstop.axis) {
                context.set_locked(endstop.motor, true);
                if self.all_installed_locked(endstop.axis, endstop.side, context) {
                    halt |= AxisMask::for_axis(endstop.axis);
                }
            } else {
                halt |= AxisMask::for_axis(endstop.axis);
            }
        }
        if !halt.is_empty() {
            context.mark_homing_leg_done();
        }
        EndstopAction::Halt(halt)
    }

    /// Every motor of the dual axis that has a switch on this side is locked.
    fn all_installed_locked(&self, axis: Axis, side: EndstopSide, context: &EngineContext) -> bool {
        [DualMotor::Primary, DualMotor::Secondary]
            .into_iter()
            .filter(|&motor| self.is_installed(Endstop { axis, side, motor }))
            .all(|motor| context.is_locked(motor))
    }
}
