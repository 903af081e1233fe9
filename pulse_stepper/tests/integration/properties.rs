//! Properties that hold for every admissible block.

use super::support::Harness;
use pulse_common::prelude::*;
use pulse_stepper::Phase;
use proptest::prelude::*;

fn block_spec() -> impl Strategy<Value = BlockSpec> {
    (
        prop::array::uniform4(0u32..1500),
        prop::array::uniform4(any::<bool>()),
        200u32..20_000,
        0u32..=100,
        0u32..=100,
        0u32..800,
        0u32..800,
        500u32..50_000,
    )
        .prop_filter("at least one step", |(steps, ..)| steps.iter().any(|&s| s > 0))
        .prop_map(
            |(steps, reverse, nominal, entry_pct, exit_pct, accel_steps, decel_steps, acceleration)| {
                BlockSpec {
                    steps,
                    reverse,
                    nominal_rate: nominal,
                    entry_rate: nominal * entry_pct / 100,
                    exit_rate: nominal * exit_pct / 100,
                    accel_steps,
                    decel_steps,
                    acceleration,
                    active_extruder: 0,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_axis_gets_exactly_its_steps(spec in block_spec()) {
        let block = Block::try_from(spec.clone()).unwrap();
        let mut h = Harness::default_machine();
        h.stepper.push_block(block).unwrap();
        let ticks = h.run_until_idle();

        for axis in Axis::ALL {
            let i = axis.index();
            let pulses: u32 = ticks.iter().map(|t| t.pulses[i] as u32).sum();
            prop_assert_eq!(pulses, spec.steps[i]);
            let signed = if spec.reverse[i] { -(spec.steps[i] as i32) } else { spec.steps[i] as i32 };
            prop_assert_eq!(h.stepper.position(axis), signed);
        }
    }

    #[test]
    fn phase_counts_sum_to_the_dominant_count(spec in block_spec()) {
        let block = Block::try_from(spec).unwrap();
        let mut h = Harness::default_machine();
        h.stepper.push_block(block).unwrap();
        let ticks = h.run_until_idle();

        let sum = |phase: Phase| ticks.iter().map(|t| t.phases.get(phase)).sum::<u32>();
        let accel = sum(Phase::Accelerating);
        let cruise = sum(Phase::Cruising);
        let decel = sum(Phase::Decelerating);
        prop_assert_eq!(accel + cruise + decel, block.step_event_count());
        prop_assert_eq!(accel, block.accel_steps());
        prop_assert_eq!(decel, block.decel_steps());
    }

    #[test]
    fn intervals_stay_programmable(spec in block_spec()) {
        let block = Block::try_from(spec).unwrap();
        let mut h = Harness::default_machine();
        h.stepper.push_block(block).unwrap();
        for tick in h.run_until_idle() {
            prop_assert!(tick.interval >= MIN_INTERVAL_TICKS);
            prop_assert!(tick.interval <= MAX_INTERVAL_TICKS);
            prop_assert!(matches!(tick.step_events, 0 | 1 | 2 | 4) || tick.block_finished);
        }
    }
}
