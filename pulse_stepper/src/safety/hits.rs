//! One-shot endstop hit records.
//!
//! The tick context latches the first trigger of each switch together with
//! the axis position at that moment. The record survives any number of
//! reports and is cleared only by an explicit acknowledgement.

use pulse_common::axis::{AxisArray, DualMotor};
use pulse_common::endstop::Endstop;
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU16, Ordering};

#[derive(Debug, Default)]
pub struct HitRecord {
    mask: AtomicU16,
    steps: [AtomicI32; Endstop::COUNT],
}

impl HitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a hit. Returns false if the switch was already recorded.
    pub(crate) fn record(&self, endstop: Endstop, steps: i32) -> bool {
        let bit = endstop.mask();
        if self.mask.load(Ordering::Acquire) & bit != 0 {
            return false;
        }
        self.steps[endstop.index()].store(steps, Ordering::Relaxed);
        self.mask.fetch_or(bit, Ordering::AcqRel);
        true
    }

    /// Bitmask of recorded switches, by [`Endstop::mask`].
    #[inline]
    pub fn mask(&self) -> u16 {
        self.mask.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_hit(&self, endstop: Endstop) -> bool {
        self.mask() & endstop.mask() != 0
    }

    /// Acknowledge every recorded hit.
    pub fn clear(&self) {
        self.mask.store(0, Ordering::Release);
    }

    /// Report of recorded hits with trigger positions converted to mm.
    pub fn report(&self, steps_per_mm: &AxisArray<f64>) -> Option<EndstopReport> {
        let mask = self.mask();
        if mask == 0 {
            return None;
        }
        let mut report = EndstopReport::default();
        for index in 0..Endstop::COUNT {
            if mask & (1 << index) == 0 {
                continue;
            }
            let Some(endstop) = Endstop::from_index(index) else {
                continue;
            };
            let steps = self.steps[index].load(Ordering::Relaxed);
            // capacity equals Endstop::COUNT, so push cannot fail
            let _ = report.hits.push(EndstopHit {
                endstop,
                steps,
                mm: steps as f64 / steps_per_mm[endstop.axis.index()],
            });
        }
        Some(report)
    }
}

/// One latched switch trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndstopHit {
    pub endstop: Endstop,
    /// Axis position when the switch fired [steps].
    pub steps: i32,
    pub mm: f64,
}

/// Hits recorded since the last acknowledgement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndstopReport {
    pub hits: heapless::Vec<EndstopHit, { Endstop::COUNT }>,
}

impl EndstopReport {
    pub fn contains(&self, endstop: Endstop) -> bool {
        self.hits.iter().any(|hit| hit.endstop == endstop)
    }
}

impl fmt::Display for EndstopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("endstops hit:")?;
        for hit in &self.hits {
            let suffix = match hit.endstop.motor {
                DualMotor::Primary => "",
                DualMotor::Secondary => "2",
            };
            write!(f, " {}{}:{:.2}", hit.endstop.axis, suffix, hit.mm)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::axis::Axis;
    use pulse_common::endstop::EndstopSide;

    const SPM: AxisArray<f64> = [80.0, 80.0, 400.0, 100.0];

    #[test]
    fn first_trigger_wins() {
        let record = HitRecord::new();
        let x_min = Endstop::new(Axis::X, EndstopSide::Min);
        assert!(record.record(x_min, 1000));
        assert!(!record.record(x_min, 2000));

        let report = record.report(&SPM).unwrap();
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].steps, 1000);
        assert_eq!(report.hits[0].mm, 12.5);
    }

    #[test]
    fn report_does_not_clear() {
        let record = HitRecord::new();
        record.record(Endstop::new(Axis::Y, EndstopSide::Max), 5);
        assert!(record.report(&SPM).is_some());
        assert!(record.report(&SPM).is_some());
        record.clear();
        assert!(record.report(&SPM).is_none());
    }

    #[test]
    fn display_lists_axes_with_mm() {
        let record = HitRecord::new();
        record.record(Endstop::new(Axis::X, EndstopSide::Min), 1000);
        record.record(Endstop::secondary(Axis::Z, EndstopSide::Min), 0);
        let text = record.report(&SPM).unwrap().to_string();
        assert_eq!(text, "endstops hit: X:12.50 Z2:0.00");
    }
}
