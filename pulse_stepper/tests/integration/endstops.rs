//! Limit switch behaviour: aborts, block ends, homing halts, dual locks.

use super::support::{Harness, constant, with_switches};
use pulse_common::prelude::*;

const X_MIN: Endstop = Endstop::new(Axis::X, EndstopSide::Min);
const X_MAX: Endstop = Endstop::new(Axis::X, EndstopSide::Max);
const Z_MIN: Endstop = Endstop::new(Axis::Z, EndstopSide::Min);
const Z2_MIN: Endstop = Endstop::secondary(Axis::Z, EndstopSide::Min);

fn toward_x_min(steps: u32) -> Block {
    Block::try_from(BlockSpec::constant_rate([steps, 0, 0, 0], 1000).reversed(Axis::X)).unwrap()
}

#[test]
fn hit_mid_block_discards_everything_within_one_tick() {
    let mut h = Harness::new(&with_switches(&[X_MIN]));
    h.stepper.push_block(toward_x_min(100)).unwrap();
    h.stepper.push_block(toward_x_min(100)).unwrap();
    h.run(10);
    assert_eq!(h.steps(Motor::X), 10);

    h.switches.set(X_MIN, true);
    let tick = h.tick.tick();
    assert_eq!(tick.step_events, 0);
    assert_eq!(tick.discarded, 2);
    assert!(tick.idle);
    assert!(h.stepper.is_idle());

    h.run(20);
    assert_eq!(h.steps(Motor::X), 10);
    assert_eq!(h.stepper.position(Axis::X), -10);

    let report = h.stepper.check_hit_endstops().unwrap();
    assert_eq!(report.hits.len(), 1);
    assert_eq!(report.hits[0].endstop, X_MIN);
    assert_eq!(report.hits[0].steps, -10);
    assert!((report.hits[0].mm + 0.125).abs() < 1e-9);

    // polling again reports the same single event
    let again = h.stepper.check_hit_endstops().unwrap();
    assert_eq!(again, report);

    h.stepper.endstops_hit_on_purpose();
    assert!(h.stepper.check_hit_endstops().is_none());
    assert_eq!(h.stepper.check_stepper_errors().endstop_aborts, 1);
}

#[test]
fn switch_behind_the_motion_is_ignored() {
    let mut h = Harness::new(&with_switches(&[X_MIN, X_MAX]));
    h.switches.set(X_MAX, true);
    h.stepper.push_block(toward_x_min(50)).unwrap();
    h.run_until_idle();

    assert_eq!(h.stepper.position(Axis::X), -50);
    assert!(h.stepper.check_hit_endstops().is_none());
}

#[test]
fn disabled_sampling_ignores_switches() {
    let mut h = Harness::new(&with_switches(&[X_MIN]));
    h.stepper.enable_endstops(false);
    h.switches.set(X_MIN, true);
    h.stepper.push_block(toward_x_min(30)).unwrap();
    h.run_until_idle();

    assert_eq!(h.stepper.position(Axis::X), -30);
    assert!(h.stepper.check_hit_endstops().is_none());
}

#[test]
fn without_abort_only_the_current_block_ends() {
    let mut h = Harness::new(&with_switches(&[X_MIN]));
    h.stepper.set_abort_on_hit(false);
    h.stepper.push_block(toward_x_min(100)).unwrap();
    h.stepper.push_block(constant([0, 40, 0, 0], 1000)).unwrap();
    h.run(5);

    h.switches.set(X_MIN, true);
    let tick = h.tick.tick();
    assert!(tick.block_finished);
    assert_eq!(tick.discarded, 0);
    h.run_until_idle();

    assert_eq!(h.stepper.positions(), [-5, 40, 0, 0]);
    assert!(h.stepper.check_hit_endstops().unwrap().contains(X_MIN));
    assert_eq!(h.stepper.check_stepper_errors().endstop_aborts, 0);
}

#[test]
fn inverting_switch_triggers_on_low_level() {
    let mut config = StepperConfig::default();
    config
        .endstops
        .switches
        .push(SwitchConfig {
            id: X_MIN,
            inverting: true,
        })
        .unwrap();
    let mut h = Harness::new(&config);
    h.switches.set(X_MIN, true);
    h.stepper.push_block(toward_x_min(20)).unwrap();
    h.run(3);
    assert_eq!(h.steps(Motor::X), 3);

    h.switches.set(X_MIN, false);
    h.run(1);
    assert!(h.stepper.is_idle());
    assert_eq!(h.steps(Motor::X), 3);
}

#[test]
fn homing_halts_only_the_homed_axis() {
    let mut h = Harness::new(&with_switches(&[X_MIN]));
    h.stepper.set_homing_in_progress(true);
    let block = Block::try_from(
        BlockSpec::constant_rate([100, 100, 0, 0], 1000).reversed(Axis::X),
    )
    .unwrap();
    h.stepper.push_block(block).unwrap();
    h.run(10);

    h.switches.set(X_MIN, true);
    h.run_until_idle();

    assert_eq!(h.stepper.positions(), [-10, 100, 0, 0]);
    assert!(h.stepper.homing_leg_complete());
    assert!(!h.stepper.homing_leg_complete());
    assert_eq!(h.stepper.check_stepper_errors().endstop_aborts, 0);

    h.stepper.endstops_hit_on_purpose();
    h.stepper.set_homing_in_progress(false);
    assert!(h.stepper.check_hit_endstops().is_none());
}

#[test]
fn dual_axis_locks_each_motor_on_its_own_switch() {
    let mut config = with_switches(&[Z_MIN, Z2_MIN]);
    config.endstops.dual_axis = Some(Axis::Z);
    config.axes.z.steps_per_mm = 100.0;
    let mut h = Harness::new(&config);
    h.stepper.set_homing_in_progress(true);
    let block =
        Block::try_from(BlockSpec::constant_rate([0, 0, 100, 0], 1000).reversed(Axis::Z)).unwrap();
    h.stepper.push_block(block).unwrap();
    h.run(5);

    h.switches.set(Z2_MIN, true);
    h.run(5);
    assert_eq!(h.steps(Motor::Z), 10);
    assert_eq!(h.steps(Motor::Z2), 5);
    assert!(h.stepper.context().is_locked(DualMotor::Secondary));
    assert!(!h.stepper.homing_leg_complete());

    h.switches.set(Z_MIN, true);
    let tick = h.tick.tick();
    assert!(tick.block_finished);
    assert!(tick.idle);
    assert_eq!(h.steps(Motor::Z), 10);
    assert_eq!(h.stepper.position(Axis::Z), -10);
    assert!(h.stepper.homing_leg_complete());

    let report = h.stepper.check_hit_endstops().unwrap();
    assert!(report.contains(Z_MIN) && report.contains(Z2_MIN));
    assert_eq!(report.to_string(), "endstops hit: Z:-0.10 Z2:-0.05");

    h.stepper.set_homing_in_progress(false);
    assert!(!h.stepper.context().is_locked(DualMotor::Primary));
    assert!(!h.stepper.context().is_locked(DualMotor::Secondary));
}

#[test]
fn producer_lock_suppresses_one_motor() {
    let mut config = with_switches(&[]);
    config.endstops.dual_axis = Some(Axis::Z);
    let mut h = Harness::new(&config);
    h.stepper.lock_axis_motor(DualMotor::Primary, true);
    h.stepper.push_block(constant([0, 0, 8, 0], 1000)).unwrap();
    h.run_until_idle();

    assert_eq!(h.steps(Motor::Z), 0);
    assert_eq!(h.steps(Motor::Z2), 8);
    assert_eq!(h.stepper.position(Axis::Z), 8);
}
