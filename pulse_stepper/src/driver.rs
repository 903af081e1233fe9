//! Stepper driver control: enable lines, microstep pins, current.
//!
//! Register-poke operations with no timing constraints; they run in the
//! producer context only.

use crate::error::StepperError;
use pulse_common::axis::Motor;
use pulse_common::consts::{MOTOR_CURRENT_MAX_MA, MOTOR_SLOTS};
use pulse_common::machine::{DriverConfig, MicrostepMode};
use std::fmt;
use tracing::{debug, info};

/// Driver board access.
pub trait DriverControl {
    /// Energize or release a motor.
    fn enable(&mut self, motor: Motor, enabled: bool);

    fn write_microstep_pins(&mut self, motor: Motor, ms1: bool, ms2: bool);

    /// Current MS1/MS2 levels; `None` when the driver has no such pins.
    fn read_microstep_pins(&mut self, motor: Motor) -> Option<(bool, bool)>;

    /// Program the current limit [mA].
    fn write_current(&mut self, motor: Motor, milliamps: u32);
}

/// Select a microstep resolution.
pub fn microstep_mode(drivers: &mut dyn DriverControl, motor: Motor, mode: MicrostepMode) {
    let (ms1, ms2) = mode.pins();
    debug!(%motor, microsteps = mode.divisor(), ms1, ms2, "microstep mode");
    drivers.write_microstep_pins(motor, ms1, ms2);
}

/// Set MS1 and/or MS2 directly; `None` keeps the current level.
pub fn microstep_ms(
    drivers: &mut dyn DriverControl,
    motor: Motor,
    ms1: Option<bool>,
    ms2: Option<bool>,
) {
    let (cur1, cur2) = drivers.read_microstep_pins(motor).unwrap_or((false, false));
    drivers.write_microstep_pins(motor, ms1.unwrap_or(cur1), ms2.unwrap_or(cur2));
}

/// Apply configured microstep modes.
pub fn microstep_init(drivers: &mut dyn DriverControl, config: &DriverConfig) {
    for settings in &config.motors {
        microstep_mode(drivers, settings.motor, settings.microsteps);
    }
    info!(drivers = config.motors.len(), "microstep modes applied");
}

/// Program one motor current.
pub fn digipot_current(
    drivers: &mut dyn DriverControl,
    motor: Motor,
    milliamps: u32,
) -> Result<(), StepperError> {
    if milliamps > MOTOR_CURRENT_MAX_MA {
        return Err(StepperError::Driver {
            motor,
            reason: format!("current {milliamps} mA above {MOTOR_CURRENT_MAX_MA} mA"),
        });
    }
    debug!(%motor, milliamps, "motor current");
    drivers.write_current(motor, milliamps);
    Ok(())
}

/// Apply configured currents.
pub fn digipot_init(drivers: &mut dyn DriverControl, config: &DriverConfig) -> Result<(), StepperError> {
    for settings in &config.motors {
        if let Some(current) = settings.current_ma {
            digipot_current(drivers, settings.motor, current)?;
        }
    }
    Ok(())
}

/// Read back the microstep pins of the given motors.
pub fn microstep_readings(drivers: &mut dyn DriverControl, motors: &[Motor]) -> MicrostepReadings {
    let mut readings = MicrostepReadings::default();
    for &motor in motors {
        // at most MOTOR_SLOTS distinct motors exist
        let _ = readings.pins.push((motor, drivers.read_microstep_pins(motor)));
    }
    readings
}

/// De-energize every listed motor.
pub fn disable_all(drivers: &mut dyn DriverControl, motors: &[Motor]) {
    for &motor in motors {
        drivers.enable(motor, false);
    }
}

/// MS1/MS2 levels per motor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MicrostepReadings {
    pub pins: heapless::Vec<(Motor, Option<(bool, bool)>), MOTOR_SLOTS>,
}

impl MicrostepReadings {
    pub fn get(&self, motor: Motor) -> Option<(bool, bool)> {
        self.pins
            .iter()
            .find(|(m, _)| *m == motor)
            .and_then(|(_, pins)| *pins)
    }
}

impl fmt::Display for MicrostepReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MS1,MS2 Pins")?;
        for (motor, pins) in &self.pins {
            match pins {
                Some((ms1, ms2)) => write!(f, "\n{motor}: {} {}", *ms1 as u8, *ms2 as u8)?,
                None => write!(f, "\n{motor}: n/a")?,
            }
        }
        Ok(())
    }
}
