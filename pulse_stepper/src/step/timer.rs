//! Step rate to timer interval conversion.
//!
//! The interval for rate `r` at timer frequency `F` is `F / r`. Dividing on
//! every tick is the dominant real-time cost, so the previous interval `c`
//! is corrected instead:
//!
//! ```text
//! e  = F - r·c
//! c' = c + (e·c·⌊2^40 / F⌋) >> 40
//! ```
//!
//! One correction per tick tracks a ramp closely because the rate changes
//! little between ticks. When the corrected interval is still more than one
//! timer tick off (`|F - r·c'| > r`), or after a block load or a change of
//! step loops, a fresh division reseeds the estimate.

use pulse_common::consts::MAX_INTERVAL_TICKS;
use pulse_common::machine::TimerConfig;

const INV_SHIFT: u32 = 40;

/// Outcome of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Timer ticks until the next tick, after clamping.
    pub ticks: u32,
    /// Step events to run per tick (1, 2 or 4).
    pub step_loops: u8,
    /// The requested rate could not be scheduled as asked.
    pub clamped: bool,
    /// The estimate came from a division.
    pub reseeded: bool,
}

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    frequency: u32,
    inv_frequency: u64,
    min_interval: u32,
    max_step_frequency: u32,
    min_step_rate: u32,
    estimate: u32,
    step_loops: u8,
    seeded: bool,
}

impl IntervalTimer {
    pub fn new(timer: &TimerConfig) -> Self {
        Self {
            frequency: timer.frequency_hz,
            inv_frequency: (1u64 << INV_SHIFT) / timer.frequency_hz as u64,
            min_interval: timer.min_interval_ticks,
            max_step_frequency: timer.max_step_frequency,
            min_step_rate: timer.min_step_rate(),
            estimate: 0,
            step_loops: 1,
            seeded: false,
        }
    }

    #[inline]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    #[inline]
    pub fn min_step_rate(&self) -> u32 {
        self.min_step_rate
    }

    /// Force a division on the next conversion.
    #[inline]
    pub fn invalidate(&mut self) {
        self.seeded = false;
    }

    /// Step loops for a step rate: 4 above half the maximum, 2 above a quarter.
    #[inline]
    fn loops_for(&self, rate: u32) -> u8 {
        if rate > self.max_step_frequency / 2 {
            4
        } else if rate > self.max_step_frequency / 4 {
            2
        } else {
            1
        }
    }

    /// Interval for a dominant-axis step rate [steps/s].
    pub fn interval_for(&mut self, step_rate: u32) -> Interval {
        let mut clamped = false;
        let mut rate = step_rate.max(self.min_step_rate);
        if rate > self.max_step_frequency {
            rate = self.max_step_frequency;
            clamped = true;
        }
        let step_loops = self.loops_for(rate);
        let tick_rate = (rate / step_loops as u32).max(1);

        let reseeded = !self.seeded || step_loops != self.step_loops || !self.correct(tick_rate);
        if reseeded {
            self.estimate = self.frequency / tick_rate;
        }
        self.seeded = true;
        self.step_loops = step_loops;

        let mut ticks = self.estimate;
        if ticks < self.min_interval {
            ticks = self.min_interval;
            clamped = true;
        }
        Interval {
            ticks: ticks.min(MAX_INTERVAL_TICKS),
            step_loops,
            clamped,
            reseeded,
        }
    }

    /// Newton step on the current estimate. False if it needs a reseed.
    #[inline]
    fn correct(&mut self, tick_rate: u32) -> bool {
        let f = self.frequency as i64;
        let r = tick_rate as i64;
        let c = self.estimate as i64;
        let error = f - r * c;
        let delta = (error as i128 * c as i128 * self.inv_frequency as i128) >> INV_SHIFT;
        let next = c + delta as i64;
        if next <= 0 || next > u32::MAX as i64 || (f - r * next).abs() > r {
            return false;
        }
        self.estimate = next as u32;
        true
    }
}
