//! Babystepping: single out-of-band step pulses.
//!
//! Requests accumulate as a signed count per axis. At the start of a tick,
//! after the quick-stop check, the tick context takes at most one pending
//! step per axis, pulses it with its own direction, then restores the
//! direction of the executing block. Babysteps move the motor but not the
//! tracked position.

use pulse_common::axis::Axis;
use pulse_common::consts::NUM_AXIS;
use std::sync::atomic::{AtomicI32, Ordering};

const TAKE_ATTEMPTS: usize = 4;

#[derive(Debug, Default)]
pub struct BabystepRequests {
    pending: [AtomicI32; NUM_AXIS],
}

impl BabystepRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one step; `forward` is the positive direction.
    pub fn request(&self, axis: Axis, forward: bool) {
        let delta = if forward { 1 } else { -1 };
        self.pending[axis.index()].fetch_add(delta, Ordering::AcqRel);
    }

    /// Net steps waiting on an axis.
    #[inline]
    pub fn pending(&self, axis: Axis) -> i32 {
        self.pending[axis.index()].load(Ordering::Acquire)
    }

    pub fn any_pending(&self) -> bool {
        Axis::ALL.iter().any(|&axis| self.pending(axis) != 0)
    }

    /// Take one step off an axis. Returns its direction (`true` = forward).
    ///
    /// Gives up after a few lost races with the producer; the step then
    /// waits for the next tick.
    pub(crate) fn take(&self, axis: Axis) -> Option<bool> {
        let slot = &self.pending[axis.index()];
        let mut current = slot.load(Ordering::Acquire);
        for _ in 0..TAKE_ATTEMPTS {
            if current == 0 {
                return None;
            }
            let next = current - current.signum();
            match slot.compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(current > 0),
                Err(actual) => current = actual,
            }
        }
        None
    }

    /// Drop every pending request.
    pub fn clear(&self) {
        for slot in &self.pending {
            slot.store(0, Ordering::Release);
        }
    }
}
