//! Simulated hardware behind the engine's hardware traits.
//!
//! - [`SimTickSource`]: armed flag plus condvar so the tick thread can sleep
//!   while the engine is idle.
//! - [`SimEndstops`]: switches that close when the recorded motor position
//!   crosses a configured point.
//! - [`SimDrivers`]: a register model of enable, microstep and current
//!   outputs.

use crate::config::SimSwitch;
use parking_lot::{Condvar, Mutex};
use pulse_common::axis::{DualMotor, Motor};
use pulse_common::consts::MOTOR_SLOTS;
use pulse_common::endstop::{Endstop, EndstopSide};
use pulse_common::machine::StepperConfig;
use pulse_stepper::{DriverControl, EndstopInputs, PortLog, PortLogs, TickSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

// ─── Tick source ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SimTickSource {
    armed: Mutex<bool>,
    wakeup: Condvar,
}

impl SimTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until armed or `timeout` elapses. Returns the armed state.
    pub fn wait_armed(&self, timeout: Duration) -> bool {
        let mut armed = self.armed.lock();
        if !*armed {
            self.wakeup.wait_for(&mut armed, timeout);
        }
        *armed
    }
}

impl TickSource for SimTickSource {
    fn arm(&self) {
        *self.armed.lock() = true;
        self.wakeup.notify_all();
    }

    fn disarm(&self) {
        *self.armed.lock() = false;
    }

    fn is_armed(&self) -> bool {
        *self.armed.lock()
    }
}

// ─── Endstops ───────────────────────────────────────────────────────

/// Motor whose position a switch senses.
fn sensed_motor(endstop: Endstop) -> Option<Motor> {
    use pulse_common::axis::Axis;
    match (endstop.axis, endstop.motor) {
        (Axis::X, DualMotor::Primary) => Some(Motor::X),
        (Axis::X, DualMotor::Secondary) => Some(Motor::X2),
        (Axis::Y, DualMotor::Primary) => Some(Motor::Y),
        (Axis::Z, DualMotor::Primary) => Some(Motor::Z),
        (Axis::Z, DualMotor::Secondary) => Some(Motor::Z2),
        _ => None,
    }
}

struct SimulatedSwitch {
    id: Endstop,
    log: Arc<PortLog>,
    /// Trigger point [steps].
    position: i64,
    inverting: bool,
}

impl SimulatedSwitch {
    fn closed(&self) -> bool {
        let at = self.log.net_steps();
        match self.id.side {
            EndstopSide::Min => at <= self.position,
            EndstopSide::Max => at >= self.position,
        }
    }
}

/// Position-driven limit switches. Unlisted switches read open.
pub struct SimEndstops {
    switches: Vec<SimulatedSwitch>,
    /// Installed inverting switches; their open level is high.
    inverting: u16,
}

impl SimEndstops {
    pub fn new(switches: &[SimSwitch], config: &StepperConfig, logs: &PortLogs) -> Self {
        let switches = switches
            .iter()
            .filter_map(|s| {
                let motor = sensed_motor(s.id)?;
                let inverting = config
                    .endstops
                    .switches
                    .iter()
                    .find(|c| c.id == s.id)
                    .is_some_and(|c| c.inverting);
                let spm = config.steps_per_mm(s.id.axis);
                Some(SimulatedSwitch {
                    id: s.id,
                    log: logs.shared(motor),
                    position: (s.position_mm * spm).round() as i64,
                    inverting,
                })
            })
            .collect();
        Self {
            switches,
            inverting: config.endstops.inverting_mask(),
        }
    }
}

impl EndstopInputs for SimEndstops {
    fn read(&mut self, endstop: Endstop) -> bool {
        match self.switches.iter().find(|s| s.id == endstop) {
            // an inverting switch pulls its input low when closed
            Some(switch) => switch.closed() != switch.inverting,
            None => self.inverting & endstop.mask() != 0,
        }
    }
}

// ─── Drivers ────────────────────────────────────────────────────────

/// Last written value of every driver output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverRegisters {
    pub enabled: bool,
    pub ms_pins: (bool, bool),
    pub current_ma: u32,
}

#[derive(Debug, Clone)]
pub struct SimDrivers {
    registers: [DriverRegisters; MOTOR_SLOTS],
    writes: u32,
}

impl SimDrivers {
    /// All motors energized, full step, no current programmed.
    pub fn new() -> Self {
        Self {
            registers: [DriverRegisters {
                enabled: true,
                ..Default::default()
            }; MOTOR_SLOTS],
            writes: 0,
        }
    }

    pub fn registers(&self, motor: Motor) -> DriverRegisters {
        self.registers[motor.index()]
    }

    /// Register writes so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    fn write(&mut self, motor: Motor, update: impl FnOnce(&mut DriverRegisters)) {
        update(&mut self.registers[motor.index()]);
        self.writes += 1;
        trace!(%motor, registers = ?self.registers[motor.index()], "driver write");
    }
}

impl Default for SimDrivers {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverControl for SimDrivers {
    fn enable(&mut self, motor: Motor, enabled: bool) {
        self.write(motor, |r| r.enabled = enabled);
    }

    fn write_microstep_pins(&mut self, motor: Motor, ms1: bool, ms2: bool) {
        self.write(motor, |r| r.ms_pins = (ms1, ms2));
    }

    fn read_microstep_pins(&mut self, motor: Motor) -> Option<(bool, bool)> {
        Some(self.registers[motor.index()].ms_pins)
    }

    fn write_current(&mut self, motor: Motor, milliamps: u32) {
        self.write(motor, |r| r.current_ma = milliamps);
    }
}
