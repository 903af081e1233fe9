//! Trapezoidal velocity profile over the step-event counter.
//!
//! Phases are indexed by step event: events `[0, accelerate_until)`
//! accelerate, `[decelerate_after, D)` decelerate, the rest cruise. A
//! collapsed plateau is simply `accelerate_until == decelerate_after`.
//!
//! Ramp rates are computed from elapsed timer ticks with one fixed-point
//! multiply: `rate = entry + (t · accel_q24) >> 24`, where
//! `accel_q24 = (acceleration << 24) / F` is computed once per block.

use pulse_common::block::Block;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Phase {
    Accelerating = 0,
    Cruising = 1,
    Decelerating = 2,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Accelerating, Phase::Cruising, Phase::Decelerating];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Step events per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseEvents([u32; 3]);

impl PhaseEvents {
    #[inline]
    pub fn add(&mut self, phase: Phase) {
        self.0[phase.index()] += 1;
    }

    #[inline]
    pub fn get(&self, phase: Phase) -> u32 {
        self.0[phase.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn merge(&mut self, other: &PhaseEvents) {
        for phase in Phase::ALL {
            self.0[phase.index()] += other.get(phase);
        }
    }
}

/// Timing cursor of the executing block.
#[derive(Debug, Clone)]
pub struct Trapezoid {
    accel_q24: u64,
    entry_rate: u32,
    nominal_rate: u32,
    exit_rate: u32,
    accelerate_until: u32,
    decelerate_after: u32,
    floor: u32,
    acceleration_time: u64,
    deceleration_time: u64,
    peak_rate: u32,
    decelerating: bool,
    rate: u32,
}

impl Trapezoid {
    /// Cursor for a freshly loaded block. `min_step_rate` is the slowest
    /// rate the timer can express.
    pub fn new(block: &Block, frequency: u32, min_step_rate: u32) -> Self {
        let accel_q24 = ((block.acceleration() as u64) << 24) / frequency.max(1) as u64;
        let accelerate_until = block.accelerate_until();
        let decelerate_after = block.decelerate_after();
        let initial = if accelerate_until == 0 && decelerate_after > 0 {
            block.nominal_rate()
        } else {
            block.entry_rate()
        };
        let rate = initial.max(min_step_rate);
        Self {
            accel_q24,
            entry_rate: block.entry_rate(),
            nominal_rate: block.nominal_rate(),
            exit_rate: block.exit_rate(),
            accelerate_until,
            decelerate_after,
            floor: min_step_rate,
            acceleration_time: 0,
            deceleration_time: 0,
            peak_rate: rate,
            decelerating: decelerate_after == 0,
            rate,
        }
    }

    /// Rate of the last computed tick [steps/s].
    #[inline]
    pub fn rate(&self) -> u32 {
        self.rate
    }

    #[inline]
    pub fn phase_at(&self, event: u32) -> Phase {
        if event < self.accelerate_until {
            Phase::Accelerating
        } else if event >= self.decelerate_after {
            Phase::Decelerating
        } else {
            Phase::Cruising
        }
    }

    #[inline]
    fn ramp(time: u64, accel_q24: u64) -> u32 {
        let gained = (time as u128 * accel_q24 as u128) >> 24;
        gained.min(u32::MAX as u128) as u32
    }

    /// Rate for the tick that will run step event `completed`.
    pub fn next_rate(&mut self, completed: u32) -> u32 {
        let rate = match self.phase_at(completed) {
            Phase::Accelerating => self
                .entry_rate
                .saturating_add(Self::ramp(self.acceleration_time, self.accel_q24))
                .min(self.nominal_rate),
            Phase::Cruising => self.nominal_rate,
            Phase::Decelerating => {
                if !self.decelerating {
                    self.decelerating = true;
                    self.peak_rate = self.rate;
                    self.deceleration_time = 0;
                }
                self.peak_rate
                    .saturating_sub(Self::ramp(self.deceleration_time, self.accel_q24))
                    .max(self.exit_rate)
            }
        };
        self.rate = rate.max(self.floor);
        self.rate
    }

    /// Account the interval programmed for the tick that runs event `completed`.
    pub fn elapse(&mut self, completed: u32, ticks: u32) {
        match self.phase_at(completed) {
            Phase::Accelerating => self.acceleration_time += ticks as u64,
            Phase::Decelerating => self.deceleration_time += ticks as u64,
            Phase::Cruising => {}
        }
    }
}
