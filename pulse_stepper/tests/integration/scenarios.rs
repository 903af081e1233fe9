//! End-to-end motion scenarios: single blocks, chains, dual carriages.

use super::support::{Harness, constant, trapezoid};
use pulse_common::prelude::*;
use pulse_stepper::Phase;

#[test]
fn trapezoid_half_speed_axis_is_evenly_spaced() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(trapezoid([1000, 500, 0, 0])).unwrap();
    let ticks = h.run_until_idle();

    let mut event = 0u32;
    let mut y_events = Vec::new();
    for tick in &ticks {
        assert!(tick.step_events <= 1, "slow block must not multi-step");
        if tick.pulses[Axis::Y.index()] > 0 {
            y_events.push(event);
        }
        event += tick.step_events as u32;
    }

    assert_eq!(event, 1000);
    assert_eq!(h.steps(Motor::X), 1000);
    assert_eq!(h.steps(Motor::Y), 500);
    assert_eq!(y_events.len(), 500);
    for gap in y_events.windows(2).map(|w| w[1] - w[0]) {
        assert!(gap == 1 || gap == 2, "gap {gap}");
    }
}

#[test]
fn trapezoid_phases_cover_every_step_event() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(trapezoid([1000, 500, 0, 0])).unwrap();
    let ticks = h.run_until_idle();

    let sum = |phase: Phase| ticks.iter().map(|t| t.phases.get(phase)).sum::<u32>();
    assert_eq!(sum(Phase::Accelerating), 200);
    assert_eq!(sum(Phase::Cruising), 600);
    assert_eq!(sum(Phase::Decelerating), 200);
}

#[test]
fn trapezoid_intervals_stay_between_nominal_and_entry() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(trapezoid([1000, 0, 0, 0])).unwrap();
    let ticks = h.run_until_idle();

    let moving: Vec<u32> = ticks
        .iter()
        .filter(|t| !t.idle)
        .map(|t| t.interval)
        .collect();
    let fastest = moving.iter().copied().min().unwrap();
    let slowest = moving.iter().copied().max().unwrap();
    // 1000 steps/s nominal and 100 steps/s entry/exit at 2 MHz
    assert!(fastest >= 1999, "fastest {fastest}");
    assert!(slowest <= 20_001, "slowest {slowest}");

    // ramp up, then back down
    let first = moving[0];
    let middle = moving[moving.len() / 2];
    let last = *moving.last().unwrap();
    assert!(first > middle);
    assert!(last > middle);
    assert!((middle as i64 - 2000).abs() <= 1);
}

#[test]
fn diagonal_pulses_both_axes_every_event() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([300, 300, 0, 0], 1000)).unwrap();
    let ticks = h.run_until_idle();

    for tick in ticks.iter().filter(|t| t.step_events > 0) {
        assert_eq!(tick.pulses[0], tick.step_events);
        assert_eq!(tick.pulses[1], tick.step_events);
    }
    assert_eq!(h.stepper.positions(), [300, 300, 0, 0]);
}

#[test]
fn chained_blocks_track_signed_position() {
    let mut h = Harness::default_machine();
    let back = Block::try_from(
        BlockSpec::constant_rate([40, 10, 0, 0], 800)
            .reversed(Axis::X)
            .reversed(Axis::Y),
    )
    .unwrap();
    h.stepper.push_block(constant([100, 0, 20, 5], 800)).unwrap();
    h.stepper.push_block(back).unwrap();
    h.stepper.push_block(constant([0, 0, 0, 30], 800)).unwrap();
    h.run_until_idle();

    assert_eq!(h.stepper.positions(), [60, -10, 20, 35]);
    assert_eq!(h.logs.get(Motor::X).net_steps(), 60);
    assert_eq!(h.logs.get(Motor::Y).net_steps(), -10);
    assert_eq!(h.logs.get(Motor::E(0)).net_steps(), 35);
    // only the last block ends at speed with nothing behind it
    assert_eq!(h.stepper.check_stepper_errors().underruns, 1);
}

#[test]
fn second_z_motor_follows_z() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([0, 0, 25, 0], 500)).unwrap();
    h.run_until_idle();
    assert_eq!(h.steps(Motor::Z), 25);
    assert_eq!(h.steps(Motor::Z2), 25);
}

#[test]
fn fast_blocks_multi_step() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([2000, 0, 0, 0], 30_000)).unwrap();
    let ticks = h.run_until_idle();

    assert_eq!(ticks.len(), 500);
    assert!(ticks.iter().all(|t| t.step_events == 4));
    assert_eq!(h.steps(Motor::X), 2000);
    assert_eq!(h.stepper.check_stepper_errors().rate_clamps, 0);
}

#[test]
fn rates_above_the_limit_are_clamped() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([400, 0, 0, 0], 50_000)).unwrap();
    let ticks = h.run_until_idle();

    assert_eq!(h.steps(Motor::X), 400);
    let faults = h.stepper.check_stepper_errors();
    assert!(faults.rate_clamps > 0);
    assert!(faults.flags().contains(FaultFlags::RATE_CLAMP));
    assert!(ticks.iter().all(|t| t.interval >= MIN_INTERVAL_TICKS));
}

fn dual_x(mode: DualXMode) -> StepperConfig {
    let mut config = StepperConfig::default();
    config.extruders.count = 2;
    config.extruders.dual_x_mode = mode;
    config
}

#[test]
fn duplication_drives_both_carriages_and_extruders() {
    let mut h = Harness::new(&dual_x(DualXMode::Duplication));
    h.stepper.push_block(constant([10, 0, 0, 5], 1000)).unwrap();
    h.run_until_idle();

    assert_eq!(h.steps(Motor::X), 10);
    assert_eq!(h.steps(Motor::X2), 10);
    assert_eq!(h.steps(Motor::E(0)), 5);
    assert_eq!(h.steps(Motor::E(1)), 5);
    assert_eq!(h.stepper.position(Axis::X), 10);
}

#[test]
fn independent_carriage_follows_active_extruder() {
    let mut h = Harness::new(&dual_x(DualXMode::Independent));
    let mut spec = BlockSpec::constant_rate([10, 0, 0, 5], 1000);
    spec.active_extruder = 1;
    h.stepper.push_spec(spec).unwrap();
    h.run_until_idle();

    assert_eq!(h.steps(Motor::X), 0);
    assert_eq!(h.steps(Motor::X2), 10);
    assert_eq!(h.steps(Motor::E(0)), 0);
    assert_eq!(h.steps(Motor::E(1)), 5);
}

#[test]
fn extruder_direction_polarity_is_per_extruder() {
    let mut config = StepperConfig::default();
    config.extruders.count = 2;
    config.extruders.invert_dir[1] = true;
    let mut h = Harness::new(&config);

    let mut spec = BlockSpec::constant_rate([0, 0, 0, 5], 500);
    spec.active_extruder = 1;
    h.stepper.push_spec(spec.clone()).unwrap();
    spec.active_extruder = 0;
    h.stepper.push_spec(spec).unwrap();
    h.run_until_idle();

    // inverted pin: positive motion drives the line low
    assert_eq!(h.logs.get(Motor::E(1)).net_steps(), -5);
    assert_eq!(h.logs.get(Motor::E(0)).net_steps(), 5);
    assert_eq!(h.stepper.position(Axis::E), 10);
}
