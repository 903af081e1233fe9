//! Producer-side lifecycle: sleep/wake, synchronize, positions, quick-stop
//! from another thread, driver shutdown.

use super::support::{Harness, constant, trapezoid};
use pulse_common::prelude::*;
use pulse_stepper::{DriverControl, TickSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[test]
fn set_then_get_position_round_trips() {
    let h = Harness::default_machine();
    h.stepper.set_position(10, 20, 30, 0).unwrap();
    assert_eq!(h.stepper.position(Axis::X), 10);
    assert_eq!(h.stepper.position(Axis::Y), 20);
    assert_eq!(h.stepper.position(Axis::Z), 30);
    assert_eq!(h.stepper.position(Axis::E), 0);
    assert_eq!(h.stepper.axis_position_mm(Axis::X), 0.125);
}

#[test]
fn second_synchronize_returns_immediately() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([50, 0, 0, 0], 1000)).unwrap();

    let mut first = 0;
    h.stepper.synchronize_with(|| {
        first += 1;
        h.tick.tick();
    });
    assert!(first >= 50);

    let mut second = 0;
    h.stepper.synchronize_with(|| second += 1);
    assert_eq!(second, 0);
    h.stepper.synchronize();
}

#[test]
fn engine_sleeps_when_drained_and_wakes_on_push() {
    let mut h = Harness::default_machine();
    assert!(h.source.is_armed());
    h.run(1);
    assert!(!h.source.is_armed());

    let arms = h.source.arm_count();
    h.stepper.push_block(constant([3, 0, 0, 0], 1000)).unwrap();
    assert!(h.source.is_armed());
    assert_eq!(h.source.arm_count(), arms + 1);

    h.run_until_idle();
    assert!(!h.source.is_armed());
    h.stepper.start();
    assert!(h.source.is_armed());
}

#[test]
fn producer_and_tick_threads() {
    let Harness {
        stepper, mut tick, ..
    } = Harness::default_machine();
    let stop = Arc::new(AtomicBool::new(false));
    let runner = {
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                tick.tick();
            }
        })
    };

    for _ in 0..40 {
        stepper
            .push_block_with(trapezoid([1000, 250, 0, 0]), thread::yield_now)
            .unwrap();
    }
    stepper.synchronize();
    stop.store(true, Ordering::Release);
    runner.join().unwrap();

    assert_eq!(stepper.positions(), [40_000, 10_000, 0, 0]);
    let faults = stepper.check_stepper_errors();
    assert_eq!(faults.step_events, 40_000);
    assert_eq!(faults.endstop_aborts, 0);
}

#[test]
fn quick_stop_from_another_thread() {
    let mut h = Harness::default_machine();
    for _ in 0..4 {
        h.stepper.push_block(constant([500, 0, 0, 0], 1000)).unwrap();
    }
    h.run(10);
    h.tick.tick();

    let handle = h.stepper.quick_stop_handle();
    thread::spawn(move || handle.trigger()).join().unwrap();

    let tick = h.tick.tick();
    assert_eq!(tick.discarded, 4);
    assert_eq!(tick.step_events, 0);
    assert!(h.stepper.is_idle());
    assert_eq!(h.stepper.position(Axis::X), 11);
    assert_eq!(h.stepper.check_stepper_errors().quick_stops, 1);

    // position stays valid after the abort
    h.stepper.set_position(0, 0, 0, 0).unwrap();
    h.stepper.push_block(constant([5, 0, 0, 0], 1000)).unwrap();
    h.run_until_idle();
    assert_eq!(h.stepper.position(Axis::X), 5);
}

#[derive(Default)]
struct Board {
    enabled: [bool; MOTOR_SLOTS],
    disables: usize,
}

impl DriverControl for Board {
    fn enable(&mut self, motor: Motor, enabled: bool) {
        self.enabled[motor.index()] = enabled;
        if !enabled {
            self.disables += 1;
        }
    }

    fn write_microstep_pins(&mut self, _motor: Motor, _ms1: bool, _ms2: bool) {}

    fn read_microstep_pins(&mut self, _motor: Motor) -> Option<(bool, bool)> {
        Some((true, true))
    }

    fn write_current(&mut self, _motor: Motor, _milliamps: u32) {}
}

#[test]
fn finish_and_disable_releases_every_motor() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(constant([20, 0, 0, 0], 1000)).unwrap();
    h.run_until_idle();

    let mut board = Board {
        enabled: [true; MOTOR_SLOTS],
        disables: 0,
    };
    h.stepper.finish_and_disable(&mut board);
    assert_eq!(board.disables, MOTOR_SLOTS);
    assert!(board.enabled.iter().all(|e| !e));

    let readings = h.stepper.microstep_readings(&mut board);
    assert_eq!(readings.get(Motor::E(3)), Some((true, true)));
}

#[test]
fn fault_report_after_underrun() {
    let mut h = Harness::default_machine();
    h.stepper.push_block(trapezoid([1000, 500, 0, 0])).unwrap();
    h.run_until_idle();

    let faults = h.stepper.check_stepper_errors();
    assert_eq!(faults.underruns, 1);
    assert_eq!(faults.overruns, 0);
    assert!(faults.flags().contains(FaultFlags::UNDERRUN));
    assert!(faults.flags().has_timing());
    assert!(!faults.flags().has_safety());

    h.tick.record_overrun();
    assert_eq!(h.stepper.check_stepper_errors().overruns, 1);
}
