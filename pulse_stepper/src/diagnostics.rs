//! Fault statistics shared between the tick and producer contexts.
//!
//! The tick context only bumps counters (relaxed atomics, no I/O). The
//! producer takes a [`StepperFaults`] snapshot and decides what to log.

use pulse_common::error::FaultFlags;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Live counters. One instance per engine.
#[derive(Debug, Default)]
pub struct FaultCounters {
    overruns: AtomicU32,
    underruns: AtomicU32,
    rate_clamps: AtomicU32,
    rejected_blocks: AtomicU32,
    endstop_aborts: AtomicU32,
    quick_stops: AtomicU32,
    reseeds: AtomicU32,
    ticks: AtomicU64,
    step_events: AtomicU64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl FaultCounters {
    pub fn new() -> Self {
        Self::default()
    }

    bump! {
        record_overrun => overruns,
        record_underrun => underruns,
        record_rate_clamp => rate_clamps,
        record_rejected_block => rejected_blocks,
        record_endstop_abort => endstop_aborts,
        record_quick_stop => quick_stops,
        record_reseed => reseeds,
    }

    #[inline]
    pub(crate) fn record_tick(&self, step_events: u32) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if step_events > 0 {
            self.step_events
                .fetch_add(step_events as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StepperFaults {
        StepperFaults {
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            rate_clamps: self.rate_clamps.load(Ordering::Relaxed),
            rejected_blocks: self.rejected_blocks.load(Ordering::Relaxed),
            endstop_aborts: self.endstop_aborts.load(Ordering::Relaxed),
            quick_stops: self.quick_stops.load(Ordering::Relaxed),
            reseeds: self.reseeds.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            step_events: self.step_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the fault counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepperFaults {
    /// Ticks that completed after their deadline.
    pub overruns: u32,
    /// Blocks that ended at speed with nothing queued behind them.
    pub underruns: u32,
    /// Intervals clamped to the shortest programmable period.
    pub rate_clamps: u32,
    /// Blocks refused at admission.
    pub rejected_blocks: u32,
    /// Quick-stops caused by an unexpected endstop hit.
    pub endstop_aborts: u32,
    /// Quick-stops requested through the control interface.
    pub quick_stops: u32,
    /// Interval recomputations that needed a full division.
    pub reseeds: u32,
    pub ticks: u64,
    pub step_events: u64,
}

impl StepperFaults {
    /// Fault classes with a non-zero count.
    pub fn flags(&self) -> FaultFlags {
        let mut flags = FaultFlags::empty();
        flags.set(FaultFlags::OVERRUN, self.overruns > 0);
        flags.set(FaultFlags::UNDERRUN, self.underruns > 0);
        flags.set(FaultFlags::RATE_CLAMP, self.rate_clamps > 0);
        flags.set(FaultFlags::REJECTED_BLOCK, self.rejected_blocks > 0);
        flags.set(FaultFlags::ENDSTOP_ABORT, self.endstop_aborts > 0);
        flags.set(FaultFlags::QUICK_STOP, self.quick_stops > 0);
        flags
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.flags().is_empty()
    }
}

impl fmt::Display for StepperFaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "overruns={} underruns={} rate_clamps={} rejected={} endstop_aborts={} \
             quick_stops={} reseeds={} ticks={} step_events={}",
            self.overruns,
            self.underruns,
            self.rate_clamps,
            self.rejected_blocks,
            self.endstop_aborts,
            self.quick_stops,
            self.reseeds,
            self.ticks,
            self.step_events
        )
    }
}
