//! Multi-axis Bresenham (DDA) stepping against the dominant axis.

use bitflags::bitflags;
use pulse_common::axis::{Axis, AxisArray};
use pulse_common::block::Block;
use pulse_common::consts::NUM_AXIS;

bitflags! {
    /// Set of logical axes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisMask: u8 {
        const X = 0x01;
        const Y = 0x02;
        const Z = 0x04;
        const E = 0x08;
    }
}

impl AxisMask {
    #[inline]
    pub const fn for_axis(axis: Axis) -> Self {
        Self::from_bits_truncate(1 << axis.index())
    }

    #[inline]
    pub const fn has(&self, axis: Axis) -> bool {
        self.contains(Self::for_axis(axis))
    }
}

/// Per-block Bresenham state.
///
/// Every accumulator starts at `D / 2` and gains `steps[a]` per step event;
/// axis `a` pulses when it reaches `D` and drops by `D`. The dominant axis
/// therefore pulses on every event, and any other axis exactly `steps[a]`
/// times, evenly spaced.
#[derive(Debug, Clone)]
pub struct Bresenham {
    steps: AxisArray<u32>,
    accumulators: AxisArray<u64>,
    remaining: AxisArray<u32>,
    event_count: u32,
    events_completed: u32,
}

impl Bresenham {
    pub fn new(block: &Block) -> Self {
        let event_count = block.step_event_count();
        let half = (event_count / 2) as u64;
        Self {
            steps: *block.step_counts(),
            accumulators: [half; NUM_AXIS],
            remaining: *block.step_counts(),
            event_count,
            events_completed: 0,
        }
    }

    /// Run one step event. Returns the axes to pulse; empty once done.
    #[inline]
    pub fn step(&mut self) -> AxisMask {
        if self.is_done() {
            return AxisMask::empty();
        }
        let d = self.event_count as u64;
        let mut pulses = AxisMask::empty();
        for axis in Axis::ALL {
            let i = axis.index();
            self.accumulators[i] += self.steps[i] as u64;
            if self.accumulators[i] >= d {
                self.accumulators[i] -= d;
                self.remaining[i] -= 1;
                pulses |= AxisMask::for_axis(axis);
            }
        }
        self.events_completed += 1;
        pulses
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.events_completed >= self.event_count
    }

    #[inline]
    pub fn events_completed(&self) -> u32 {
        self.events_completed
    }

    #[inline]
    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    #[inline]
    pub fn remaining(&self, axis: Axis) -> u32 {
        self.remaining[axis.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use pulse_common::block::BlockSpec;

    fn run(steps: AxisArray<u32>) -> Vec<AxisMask> {
        let block = Block::try_from(BlockSpec::constant_rate(steps, 1000)).unwrap();
        let mut bresenham = Bresenham::new(&block);
        let mut events = Vec::new();
        while !bresenham.is_done() {
            events.push(bresenham.step());
        }
        assert_eq!(bresenham.step(), AxisMask::empty());
        events
    }

    #[test]
    fn half_rate_axis_alternates() {
        let events = run([1000, 500, 0, 0]);
        assert_eq!(events.len(), 1000);
        assert!(events.iter().all(|e| e.has(Axis::X)));
        let y: Vec<usize> = (0..events.len()).filter(|&i| events[i].has(Axis::Y)).collect();
        assert_eq!(y.len(), 500);
        assert!(y.windows(2).all(|w| w[1] - w[0] == 2));
    }

    #[test]
    fn diagonal_pulses_both_every_event() {
        let events = run([300, 300, 0, 0]);
        assert!(events.iter().all(|e| *e == AxisMask::X | AxisMask::Y));
    }

    #[test]
    fn remaining_counts_down_to_zero() {
        let block = Block::try_from(BlockSpec::constant_rate([7, 3, 0, 5], 100)).unwrap();
        let mut bresenham = Bresenham::new(&block);
        assert_eq!(bresenham.remaining(Axis::Y), 3);
        while !bresenham.is_done() {
            bresenham.step();
        }
        for axis in Axis::ALL {
            assert_eq!(bresenham.remaining(axis), 0);
        }
    }

    proptest! {
        #[test]
        fn exact_counts_and_even_spacing(
            d in 1u32..2000,
            a in 0u32..2000,
            b in 0u32..2000,
            c in 0u32..2000,
        ) {
            let steps = [d, a.min(d), b.min(d), c.min(d)];
            let events = run(steps);
            prop_assert_eq!(events.len() as u32, d);
            for axis in Axis::ALL {
                let s = steps[axis.index()];
                let ticks: Vec<u64> = (0..events.len())
                    .filter(|&i| events[i].has(axis))
                    .map(|i| i as u64)
                    .collect();
                prop_assert_eq!(ticks.len() as u32, s);
                // gaps are floor(D/s) or ceil(D/s)
                for w in ticks.windows(2) {
                    let gap = w[1] - w[0];
                    let lo = d as u64 / s as u64;
                    let hi = (d as u64).div_ceil(s as u64);
                    prop_assert!(gap >= lo && gap <= hi, "axis {} gap {} not in [{}, {}]", axis, gap, lo, hi);
                }
            }
        }
    }
}
