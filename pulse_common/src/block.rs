//! Motion block model.
//!
//! A [`BlockSpec`] is what the planner (or a job file) describes; a [`Block`]
//! is the admitted, immutable form the engine executes. Conversion enforces
//! the block invariants once, at the boundary, so the tick context never has
//! to validate anything.

use crate::axis::{Axis, AxisArray};
use crate::consts::MAX_EXTRUDERS;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

bitflags! {
    /// Per-axis direction of a block. A set bit means negative motion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirectionBits: u8 {
        const X_NEG = 0x01;
        const Y_NEG = 0x02;
        const Z_NEG = 0x04;
        const E_NEG = 0x08;
    }
}

impl DirectionBits {
    /// Bit for a single axis.
    #[inline]
    pub const fn for_axis(axis: Axis) -> Self {
        Self::from_bits_truncate(1 << axis.index())
    }

    #[inline]
    pub const fn is_negative(&self, axis: Axis) -> bool {
        self.contains(Self::for_axis(axis))
    }
}

/// Admission failures for a motion block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block has zero steps on every axis")]
    Empty,

    #[error("nominal rate must be positive")]
    ZeroNominalRate,

    #[error("entry rate {entry} exceeds nominal rate {nominal}")]
    EntryAboveNominal { entry: u32, nominal: u32 },

    #[error("exit rate {exit} exceeds nominal rate {nominal}")]
    ExitAboveNominal { exit: u32, nominal: u32 },

    #[error("ramp steps given without an acceleration")]
    MissingAcceleration,

    #[error("extruder {0} out of range [0, {max})", max = MAX_EXTRUDERS)]
    ExtruderOutOfRange(u8),
}

/// Planner-side description of a straight-line move in step space.
///
/// # TOML Example
///
/// ```toml
/// steps = [1000, 500, 0, 0]
/// reverse = [false, true, false, false]
/// nominal_rate = 1000
/// entry_rate = 100
/// exit_rate = 100
/// accel_steps = 200
/// decel_steps = 200
/// acceleration = 2475
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockSpec {
    /// Step count per axis.
    pub steps: AxisArray<u32>,
    /// Negative motion per axis.
    #[serde(default)]
    pub reverse: AxisArray<bool>,
    /// Cruise rate [steps/s of the dominant axis].
    pub nominal_rate: u32,
    #[serde(default)]
    pub entry_rate: u32,
    #[serde(default)]
    pub exit_rate: u32,
    /// Step events spent accelerating from entry to nominal.
    #[serde(default)]
    pub accel_steps: u32,
    /// Step events spent decelerating from nominal to exit.
    #[serde(default)]
    pub decel_steps: u32,
    /// [steps/s²]
    #[serde(default)]
    pub acceleration: u32,
    #[serde(default)]
    pub active_extruder: u8,
}

impl BlockSpec {
    /// A move at constant rate with no ramps.
    pub fn constant_rate(steps: AxisArray<u32>, rate: u32) -> Self {
        Self {
            steps,
            nominal_rate: rate,
            entry_rate: rate,
            exit_rate: rate,
            ..Default::default()
        }
    }

    /// Same move with the given axis reversed.
    pub fn reversed(mut self, axis: Axis) -> Self {
        self.reverse[axis.index()] = true;
        self
    }
}

/// An admitted motion block.
///
/// Invariants: at least one step, `entry_rate <= nominal_rate`,
/// `exit_rate <= nominal_rate`, `accel_steps + decel_steps <= step_event_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    steps: AxisArray<u32>,
    direction: DirectionBits,
    dominant: Axis,
    step_event_count: u32,
    nominal_rate: u32,
    entry_rate: u32,
    exit_rate: u32,
    accelerate_until: u32,
    decelerate_after: u32,
    acceleration: u32,
    active_extruder: u8,
}

impl TryFrom<BlockSpec> for Block {
    type Error = BlockError;

    fn try_from(spec: BlockSpec) -> Result<Self, Self::Error> {
        let mut dominant = Axis::X;
        for axis in Axis::ALL {
            if spec.steps[axis.index()] > spec.steps[dominant.index()] {
                dominant = axis;
            }
        }
        let count = spec.steps[dominant.index()];

        if count == 0 {
            return Err(BlockError::Empty);
        }
        if spec.nominal_rate == 0 {
            return Err(BlockError::ZeroNominalRate);
        }
        if spec.entry_rate > spec.nominal_rate {
            return Err(BlockError::EntryAboveNominal {
                entry: spec.entry_rate,
                nominal: spec.nominal_rate,
            });
        }
        if spec.exit_rate > spec.nominal_rate {
            return Err(BlockError::ExitAboveNominal {
                exit: spec.exit_rate,
                nominal: spec.nominal_rate,
            });
        }
        if spec.acceleration == 0 && (spec.accel_steps > 0 || spec.decel_steps > 0) {
            return Err(BlockError::MissingAcceleration);
        }
        if spec.active_extruder as usize >= MAX_EXTRUDERS {
            return Err(BlockError::ExtruderOutOfRange(spec.active_extruder));
        }

        let (accel, decel) = split_ramps(count, spec.accel_steps, spec.decel_steps);

        let mut direction = DirectionBits::empty();
        for axis in Axis::ALL {
            if spec.reverse[axis.index()] {
                direction |= DirectionBits::for_axis(axis);
            }
        }

        Ok(Self {
            steps: spec.steps,
            direction,
            dominant,
            step_event_count: count,
            nominal_rate: spec.nominal_rate,
            entry_rate: spec.entry_rate,
            exit_rate: spec.exit_rate,
            accelerate_until: accel,
            decelerate_after: count - decel,
            acceleration: spec.acceleration,
            active_extruder: spec.active_extruder,
        })
    }
}

/// Ramp lengths that fit in `count` step events.
///
/// When both ramps do not fit, the plateau collapses and `count` is split
/// in proportion to the requested ramps.
fn split_ramps(count: u32, accel: u32, decel: u32) -> (u32, u32) {
    let total = accel as u64 + decel as u64;
    if total <= count as u64 {
        return (accel, decel);
    }
    let accel = (count as u64 * accel as u64 / total) as u32;
    (accel, count - accel)
}

impl Block {
    #[inline]
    pub const fn steps(&self, axis: Axis) -> u32 {
        self.steps[axis.index()]
    }

    #[inline]
    pub const fn step_counts(&self) -> &AxisArray<u32> {
        &self.steps
    }

    /// Axis with the largest step count; the first one on ties.
    #[inline]
    pub const fn dominant_axis(&self) -> Axis {
        self.dominant
    }

    /// Step events in this block (the dominant axis step count).
    #[inline]
    pub const fn step_event_count(&self) -> u32 {
        self.step_event_count
    }

    #[inline]
    pub const fn direction(&self) -> DirectionBits {
        self.direction
    }

    #[inline]
    pub const fn is_negative(&self, axis: Axis) -> bool {
        self.direction.is_negative(axis)
    }

    /// True if the block pulses the axis at all.
    #[inline]
    pub const fn moves(&self, axis: Axis) -> bool {
        self.steps[axis.index()] > 0
    }

    pub const fn nominal_rate(&self) -> u32 {
        self.nominal_rate
    }

    pub const fn entry_rate(&self) -> u32 {
        self.entry_rate
    }

    pub const fn exit_rate(&self) -> u32 {
        self.exit_rate
    }

    pub const fn acceleration(&self) -> u32 {
        self.acceleration
    }

    pub const fn active_extruder(&self) -> u8 {
        self.active_extruder
    }

    /// Step events before which the block accelerates.
    #[inline]
    pub const fn accelerate_until(&self) -> u32 {
        self.accelerate_until
    }

    /// Step events after which the block decelerates.
    #[inline]
    pub const fn decelerate_after(&self) -> u32 {
        self.decelerate_after
    }

    pub const fn accel_steps(&self) -> u32 {
        self.accelerate_until
    }

    pub const fn cruise_steps(&self) -> u32 {
        self.decelerate_after - self.accelerate_until
    }

    pub const fn decel_steps(&self) -> u32 {
        self.step_event_count - self.decelerate_after
    }
}

impl From<&Block> for BlockSpec {
    fn from(block: &Block) -> Self {
        let mut reverse = [false; crate::consts::NUM_AXIS];
        for axis in Axis::ALL {
            reverse[axis.index()] = block.is_negative(axis);
        }
        Self {
            steps: block.steps,
            reverse,
            nominal_rate: block.nominal_rate,
            entry_rate: block.entry_rate,
            exit_rate: block.exit_rate,
            accel_steps: block.accel_steps(),
            decel_steps: block.decel_steps(),
            acceleration: block.acceleration,
            active_extruder: block.active_extruder,
        }
    }
}
