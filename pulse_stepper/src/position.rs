//! Absolute machine position in steps.
//!
//! Single writer (the tick context, or the producer while the engine is
//! idle), many readers. Each axis is one atomic word, so a reader never sees
//! a torn value.

use pulse_common::axis::{Axis, AxisArray};
use pulse_common::consts::NUM_AXIS;
use std::sync::atomic::{AtomicI32, Ordering};

#[derive(Debug, Default)]
pub struct PositionTracker {
    steps: [AtomicI32; NUM_AXIS],
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> i32 {
        self.steps[axis.index()].load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AxisArray<i32> {
        Axis::ALL.map(|axis| self.get(axis))
    }

    /// Overwrite one axis. Caller guarantees no block is executing.
    #[inline]
    pub fn set(&self, axis: Axis, steps: i32) {
        self.steps[axis.index()].store(steps, Ordering::Release);
    }

    pub fn set_all(&self, steps: AxisArray<i32>) {
        for axis in Axis::ALL {
            self.set(axis, steps[axis.index()]);
        }
    }

    /// Apply committed pulses. Tick context only.
    #[inline]
    pub(crate) fn advance(&self, axis: Axis, delta: i32) {
        if delta != 0 {
            self.steps[axis.index()].fetch_add(delta, Ordering::AcqRel);
        }
    }
}
