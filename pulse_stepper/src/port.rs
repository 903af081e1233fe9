//! Step/dir port table and pulse dispatch.
//!
//! Each physical motor has one [`StepPort`] slot, indexed by
//! [`Motor::index`]. A logical axis pulse is routed through a small dispatch
//! rule: the active extruder picks the extruder port (and the X carriage in
//! independent dual-X mode), duplication mode drives both carriages and the
//! first two extruders together, and a second Z (or X) motor follows its
//! axis unless locked.

use pulse_common::axis::{Axis, DualMotor, Motor};
use pulse_common::block::Block;
use pulse_common::consts::{MAX_EXTRUDERS, MOTOR_SLOTS};
use pulse_common::machine::{DualXMode, StepperConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

/// Pin-level step/dir output of one motor driver.
pub trait StepPort: Send {
    fn write_dir(&mut self, high: bool);
    fn write_step(&mut self, high: bool);
}

/// Motors one axis pulse is routed to.
pub type MotorSet = heapless::Vec<Motor, 2>;

pub struct PortTable {
    ports: [Option<Box<dyn StepPort>>; MOTOR_SLOTS],
    invert_dir: [bool; MOTOR_SLOTS],
    dual_x_mode: DualXMode,
    dual_axis: Option<Axis>,
}

impl PortTable {
    pub fn new() -> Self {
        Self {
            ports: std::array::from_fn(|_| None),
            invert_dir: [false; MOTOR_SLOTS],
            dual_x_mode: DualXMode::Disabled,
            dual_axis: None,
        }
    }

    /// Install a port, returning the one it replaces.
    pub fn insert(&mut self, motor: Motor, port: Box<dyn StepPort>) -> Option<Box<dyn StepPort>> {
        self.ports[motor.index()].replace(port)
    }

    pub fn with(mut self, motor: Motor, port: impl StepPort + 'static) -> Self {
        self.insert(motor, Box::new(port));
        self
    }

    /// A table with a [`RecordingPort`] in every slot.
    pub fn recording() -> (Self, PortLogs) {
        let mut table = Self::new();
        let logs = std::array::from_fn(|index| {
            let (port, log) = RecordingPort::new();
            table.ports[index] = Some(Box::new(port));
            log
        });
        (table, PortLogs(logs))
    }

    #[inline]
    pub fn has(&self, motor: Motor) -> bool {
        self.ports[motor.index()].is_some()
    }

    /// Motors with a port installed.
    pub fn installed(&self) -> heapless::Vec<Motor, MOTOR_SLOTS> {
        (0..MOTOR_SLOTS)
            .filter(|&index| self.ports[index].is_some())
            .filter_map(Motor::from_index)
            .collect()
    }

    /// First motor the configuration needs but the table lacks.
    pub fn missing(&self, config: &StepperConfig) -> Option<Motor> {
        let mut required: heapless::Vec<Motor, MOTOR_SLOTS> = heapless::Vec::new();
        for motor in [Motor::X, Motor::Y, Motor::Z] {
            let _ = required.push(motor);
        }
        if config.extruders.dual_x_mode != DualXMode::Disabled
            || config.endstops.dual_axis == Some(Axis::X)
        {
            let _ = required.push(Motor::X2);
        }
        if config.endstops.dual_axis == Some(Axis::Z) {
            let _ = required.push(Motor::Z2);
        }
        for n in 0..(config.extruders.count as usize).min(MAX_EXTRUDERS) {
            if let Some(motor) = Motor::extruder(n) {
                let _ = required.push(motor);
            }
        }
        required.into_iter().find(|motor| !self.has(*motor))
    }

    /// Take direction polarity and dispatch modes from configuration.
    pub(crate) fn configure(&mut self, config: &StepperConfig) {
        let axes = &config.axes;
        self.invert_dir[Motor::X.index()] = axes.x.invert_dir;
        self.invert_dir[Motor::X2.index()] = axes.x.secondary_invert_dir;
        self.invert_dir[Motor::Y.index()] = axes.y.invert_dir;
        self.invert_dir[Motor::Z.index()] = axes.z.invert_dir;
        self.invert_dir[Motor::Z2.index()] = axes.z.secondary_invert_dir;
        for n in 0..MAX_EXTRUDERS {
            if let Some(motor) = Motor::extruder(n) {
                self.invert_dir[motor.index()] = config.extruders.invert_dir[n];
            }
        }
        self.dual_x_mode = config.extruders.dual_x_mode;
        self.dual_axis = config.endstops.dual_axis;
    }

    /// Step lines low, direction lines positive.
    pub(crate) fn reset(&mut self) {
        for index in 0..MOTOR_SLOTS {
            let invert = self.invert_dir[index];
            if let Some(port) = self.ports[index].as_mut() {
                port.write_step(false);
                port.write_dir(!invert);
            }
        }
    }

    /// Dispatch rule for one axis.
    pub fn motors(&self, axis: Axis, extruder: u8) -> MotorSet {
        let mut set = MotorSet::new();
        match axis {
            Axis::X => match self.dual_x_mode {
                DualXMode::Disabled => {
                    let _ = set.push(Motor::X);
                    if self.dual_axis == Some(Axis::X) {
                        let _ = set.push(Motor::X2);
                    }
                }
                DualXMode::Independent => {
                    let _ = set.push(if extruder == 0 { Motor::X } else { Motor::X2 });
                }
                DualXMode::Duplication => {
                    let _ = set.push(Motor::X);
                    let _ = set.push(Motor::X2);
                }
            },
            Axis::Y => {
                let _ = set.push(Motor::Y);
            }
            Axis::Z => {
                let _ = set.push(Motor::Z);
                if self.has(Motor::Z2) {
                    let _ = set.push(Motor::Z2);
                }
            }
            Axis::E => {
                if self.dual_x_mode == DualXMode::Duplication {
                    let _ = set.push(Motor::E(0));
                    let _ = set.push(Motor::E(1));
                } else {
                    let _ = set.push(Motor::E(extruder));
                }
            }
        }
        set
    }

    /// Which half of the dual-endstop axis a motor is, if any.
    #[inline]
    fn dual_role(&self, motor: Motor) -> Option<DualMotor> {
        match (self.dual_axis, motor) {
            (Some(Axis::X), Motor::X) | (Some(Axis::Z), Motor::Z) => Some(DualMotor::Primary),
            (Some(Axis::X), Motor::X2) | (Some(Axis::Z), Motor::Z2) => Some(DualMotor::Secondary),
            _ => None,
        }
    }

    #[inline]
    fn write_dir(&mut self, motor: Motor, negative: bool) {
        let index = motor.index();
        let high = negative == self.invert_dir[index];
        if let Some(port) = self.ports[index].as_mut() {
            port.write_dir(high);
        }
    }

    /// Direction of one axis.
    pub(crate) fn set_direction(&mut self, axis: Axis, extruder: u8, negative: bool) {
        for motor in self.motors(axis, extruder) {
            self.write_dir(motor, negative);
        }
    }

    /// Direction lines for every axis the block moves.
    pub(crate) fn set_directions(&mut self, block: &Block) {
        for axis in Axis::ALL {
            if block.moves(axis) {
                self.set_direction(axis, block.active_extruder(), block.is_negative(axis));
            }
        }
    }

    /// One step pulse on every motor of the axis, skipping locked dual motors.
    /// `locked` holds one bit per [`DualMotor`]. False if no motor moved.
    pub(crate) fn pulse(&mut self, axis: Axis, extruder: u8, locked: u8) -> bool {
        let mut moved = false;
        for motor in self.motors(axis, extruder) {
            if let Some(role) = self.dual_role(motor) {
                if locked & (1 << role.index()) != 0 {
                    continue;
                }
            }
            if let Some(port) = self.ports[motor.index()].as_mut() {
                port.write_step(true);
                port.write_step(false);
                moved = true;
            }
        }
        moved
    }
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PortTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortTable")
            .field("installed", &self.installed())
            .field("dual_x_mode", &self.dual_x_mode)
            .field("dual_axis", &self.dual_axis)
            .finish()
    }
}

// ─── Recording Port ─────────────────────────────────────────────────

/// Edge counters of one recorded port.
#[derive(Debug, Default)]
pub struct PortLog {
    rising_edges: AtomicU32,
    net_steps: AtomicI64,
    dir_high: AtomicBool,
    dir_writes: AtomicU32,
    step_high: AtomicBool,
}

impl PortLog {
    /// Step pulses seen.
    pub fn steps(&self) -> u32 {
        self.rising_edges.load(Ordering::Acquire)
    }

    /// Pulses with direction high minus pulses with direction low.
    pub fn net_steps(&self) -> i64 {
        self.net_steps.load(Ordering::Acquire)
    }

    pub fn dir_high(&self) -> bool {
        self.dir_high.load(Ordering::Acquire)
    }

    pub fn dir_writes(&self) -> u32 {
        self.dir_writes.load(Ordering::Acquire)
    }
}

/// A port that only counts what it is told to do.
#[derive(Debug)]
pub struct RecordingPort {
    log: Arc<PortLog>,
}

impl RecordingPort {
    pub fn new() -> (Self, Arc<PortLog>) {
        let log = Arc::new(PortLog::default());
        (Self { log: log.clone() }, log)
    }
}

impl StepPort for RecordingPort {
    fn write_dir(&mut self, high: bool) {
        self.log.dir_high.store(high, Ordering::Release);
        self.log.dir_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn write_step(&mut self, high: bool) {
        let was_high = self.log.step_high.swap(high, Ordering::AcqRel);
        if high && !was_high {
            self.log.rising_edges.fetch_add(1, Ordering::AcqRel);
            let delta = if self.log.dir_high() { 1 } else { -1 };
            self.log.net_steps.fetch_add(delta, Ordering::AcqRel);
        }
    }
}

/// Logs of a [`PortTable::recording`] table, by motor.
#[derive(Debug, Clone)]
pub struct PortLogs([Arc<PortLog>; MOTOR_SLOTS]);

impl PortLogs {
    pub fn get(&self, motor: Motor) -> &PortLog {
        &self.0[motor.index()]
    }

    pub fn shared(&self, motor: Motor) -> Arc<PortLog> {
        self.0[motor.index()].clone()
    }
}
