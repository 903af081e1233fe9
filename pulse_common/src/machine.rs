//! Stepper engine configuration sections.
//!
//! Loaded from the machine TOML file; every numeric parameter is bounds
//! checked by [`Validate::validate`] before the engine is built.
//!
//! # TOML Example
//!
//! ```toml
//! [timer]
//! frequency_hz = 2000000
//! max_step_frequency = 40000
//!
//! [axes.x]
//! steps_per_mm = 80.0
//!
//! [axes.z]
//! steps_per_mm = 400.0
//! invert_dir = true
//!
//! [extruders]
//! count = 2
//! invert_dir = [false, true, false, false]
//! dual_x_mode = "duplication"
//!
//! [endstops]
//! abort_on_hit = true
//! dual_axis = "z"
//!
//! [[endstops.switches]]
//! id = "z_min"
//!
//! [[endstops.switches]]
//! id = "z2_min"
//! inverting = true
//!
//! [[drivers.motors]]
//! motor = "x"
//! microsteps = 16
//! current_ma = 1200
//! ```

use crate::axis::{Axis, DualMotor, Motor};
use crate::config::Validate;
use crate::consts::*;
use crate::endstop::Endstop;
use serde::{Deserialize, Serialize};

// ─── Timer ──────────────────────────────────────────────────────────

/// Step timer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Timer counting frequency [Hz].
    pub frequency_hz: u32,
    /// Highest dominant-axis step rate [steps/s].
    pub max_step_frequency: u32,
    /// Shortest tick interval [timer ticks].
    pub min_interval_ticks: u32,
    /// Tick interval while no block is loaded [timer ticks].
    pub idle_interval_ticks: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            frequency_hz: TIMER_FREQUENCY_HZ,
            max_step_frequency: MAX_STEP_FREQUENCY,
            min_interval_ticks: MIN_INTERVAL_TICKS,
            idle_interval_ticks: IDLE_INTERVAL_TICKS,
        }
    }
}

impl TimerConfig {
    /// Lowest step rate whose interval fits the 16-bit compare register.
    pub const fn min_step_rate(&self) -> u32 {
        self.frequency_hz / MAX_INTERVAL_TICKS + 1
    }
}

impl Validate for TimerConfig {
    fn validate(&self) -> Result<(), String> {
        if !(TIMER_FREQUENCY_HZ_MIN..=TIMER_FREQUENCY_HZ_MAX).contains(&self.frequency_hz) {
            return Err(format!(
                "timer.frequency_hz {} out of range [{TIMER_FREQUENCY_HZ_MIN}, {TIMER_FREQUENCY_HZ_MAX}]",
                self.frequency_hz
            ));
        }
        if !(MAX_STEP_FREQUENCY_MIN..=MAX_STEP_FREQUENCY_MAX).contains(&self.max_step_frequency) {
            return Err(format!(
                "timer.max_step_frequency {} out of range [{MAX_STEP_FREQUENCY_MIN}, {MAX_STEP_FREQUENCY_MAX}]",
                self.max_step_frequency
            ));
        }
        if self.min_interval_ticks == 0 || self.min_interval_ticks > MIN_INTERVAL_TICKS_MAX {
            return Err(format!(
                "timer.min_interval_ticks {} out of range [1, {MIN_INTERVAL_TICKS_MAX}]",
                self.min_interval_ticks
            ));
        }
        if self.idle_interval_ticks < self.min_interval_ticks
            || self.idle_interval_ticks > MAX_INTERVAL_TICKS
        {
            return Err(format!(
                "timer.idle_interval_ticks {} out of range [{}, {MAX_INTERVAL_TICKS}]",
                self.idle_interval_ticks, self.min_interval_ticks
            ));
        }
        // quad stepping runs the timer at a quarter of the step rate
        let fastest_tick = self.max_step_frequency.div_ceil(4);
        if self.frequency_hz / fastest_tick < self.min_interval_ticks {
            return Err(format!(
                "timer.max_step_frequency {} unreachable at {} Hz with min_interval_ticks {}",
                self.max_step_frequency, self.frequency_hz, self.min_interval_ticks
            ));
        }
        Ok(())
    }
}

// ─── Axes ───────────────────────────────────────────────────────────

/// Per-axis mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub steps_per_mm: f64,
    /// Direction pin polarity of the primary motor.
    pub invert_dir: bool,
    /// Direction pin polarity of the second motor (X2, Z2).
    pub secondary_invert_dir: bool,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 80.0,
            invert_dir: false,
            secondary_invert_dir: false,
        }
    }
}

/// All four logical axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AxesConfig {
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub z: AxisConfig,
    pub e: AxisConfig,
}

impl AxesConfig {
    pub const fn get(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
            Axis::E => &self.e,
        }
    }
}

impl Validate for AxesConfig {
    fn validate(&self) -> Result<(), String> {
        for axis in Axis::ALL {
            let spm = self.get(axis).steps_per_mm;
            if !spm.is_finite() || !(STEPS_PER_MM_MIN..=STEPS_PER_MM_MAX).contains(&spm) {
                return Err(format!(
                    "axes.{}.steps_per_mm {spm} out of range [{STEPS_PER_MM_MIN}, {STEPS_PER_MM_MAX}]",
                    axis.letter().to_ascii_lowercase()
                ));
            }
        }
        Ok(())
    }
}

// ─── Extruders ──────────────────────────────────────────────────────

/// Dual X carriage dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DualXMode {
    /// Single X carriage.
    #[default]
    Disabled = 0,
    /// X pulses go to the carriage of the active extruder.
    Independent = 1,
    /// Both carriages and the first two extruders move together.
    Duplication = 2,
}

impl DualXMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Independent),
            2 => Some(Self::Duplication),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtruderConfig {
    /// Installed extruders, `1..=MAX_EXTRUDERS`.
    pub count: u8,
    /// Direction pin polarity per extruder.
    pub invert_dir: [bool; MAX_EXTRUDERS],
    pub dual_x_mode: DualXMode,
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self {
            count: 1,
            invert_dir: [false; MAX_EXTRUDERS],
            dual_x_mode: DualXMode::Disabled,
        }
    }
}

impl Validate for ExtruderConfig {
    fn validate(&self) -> Result<(), String> {
        if self.count == 0 || self.count as usize > MAX_EXTRUDERS {
            return Err(format!(
                "extruders.count {} out of range [1, {MAX_EXTRUDERS}]",
                self.count
            ));
        }
        if self.dual_x_mode != DualXMode::Disabled && self.count < 2 {
            return Err(format!(
                "extruders.dual_x_mode {:?} needs at least 2 extruders",
                self.dual_x_mode
            ));
        }
        Ok(())
    }
}

// ─── Endstops ───────────────────────────────────────────────────────

/// One installed limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub id: Endstop,
    /// Input reads low when triggered.
    #[serde(default)]
    pub inverting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndstopConfig {
    /// Sampling armed after init.
    pub enabled: bool,
    /// Quick-stop on an unexpected hit; otherwise only the current block ends.
    pub abort_on_hit: bool,
    /// Axis driven by two independently limited motors.
    pub dual_axis: Option<Axis>,
    pub switches: heapless::Vec<SwitchConfig, { Endstop::COUNT }>,
}

impl Default for EndstopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            abort_on_hit: true,
            dual_axis: None,
            switches: heapless::Vec::new(),
        }
    }
}

impl EndstopConfig {
    /// Bitmask of installed switches, by [`Endstop::mask`].
    pub fn installed_mask(&self) -> u16 {
        self.switches.iter().fold(0, |mask, s| mask | s.id.mask())
    }

    /// Bitmask of inverting switches.
    pub fn inverting_mask(&self) -> u16 {
        self.switches
            .iter()
            .filter(|s| s.inverting)
            .fold(0, |mask, s| mask | s.id.mask())
    }
}

impl Validate for EndstopConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(axis) = self.dual_axis {
            if !matches!(axis, Axis::X | Axis::Z) {
                return Err(format!("endstops.dual_axis {axis} has no second motor"));
            }
        }
        let mut seen = 0u16;
        for switch in &self.switches {
            let id = switch.id;
            if seen & id.mask() != 0 {
                return Err(format!("endstops.switches: duplicate switch {id}"));
            }
            seen |= id.mask();
            if id.axis == Axis::E {
                return Err(format!("endstops.switches: {id} on the extruder axis"));
            }
            if id.motor == DualMotor::Secondary && self.dual_axis != Some(id.axis) {
                return Err(format!(
                    "endstops.switches: {id} needs endstops.dual_axis = \"{}\"",
                    id.axis.letter().to_ascii_lowercase()
                ));
            }
        }
        Ok(())
    }
}

// ─── Drivers ────────────────────────────────────────────────────────

/// Microstep resolution selected by the MS1/MS2 pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum MicrostepMode {
    Full,
    Half,
    Quarter,
    Eighth,
    #[default]
    Sixteenth,
}

impl MicrostepMode {
    /// Microsteps per full step.
    pub const fn divisor(self) -> u8 {
        match self {
            Self::Full => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }

    pub const fn from_divisor(divisor: u8) -> Option<Self> {
        match divisor {
            1 => Some(Self::Full),
            2 => Some(Self::Half),
            4 => Some(Self::Quarter),
            8 => Some(Self::Eighth),
            16 => Some(Self::Sixteenth),
            _ => None,
        }
    }

    /// MS1/MS2 pin levels. Eighth and sixteenth share a pattern; the
    /// driver chip decides which one it means.
    pub const fn pins(self) -> (bool, bool) {
        match self {
            Self::Full => (false, false),
            Self::Half => (true, false),
            Self::Quarter => (false, true),
            Self::Eighth | Self::Sixteenth => (true, true),
        }
    }
}

impl TryFrom<u8> for MicrostepMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_divisor(value)
            .ok_or_else(|| format!("microsteps {value} not one of 1, 2, 4, 8, 16"))
    }
}

impl From<MicrostepMode> for u8 {
    fn from(mode: MicrostepMode) -> Self {
        mode.divisor()
    }
}

/// Settings of one stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    pub motor: Motor,
    #[serde(default)]
    pub microsteps: MicrostepMode,
    /// Motor current [mA]; `None` leaves the digipot untouched.
    #[serde(default)]
    pub current_ma: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DriverConfig {
    pub motors: heapless::Vec<DriverSettings, MOTOR_SLOTS>,
}

impl DriverConfig {
    pub fn get(&self, motor: Motor) -> Option<&DriverSettings> {
        self.motors.iter().find(|d| d.motor == motor)
    }
}

impl Validate for DriverConfig {
    fn validate(&self) -> Result<(), String> {
        let mut seen = 0u16;
        for driver in &self.motors {
            let bit = 1u16 << driver.motor.index();
            if seen & bit != 0 {
                return Err(format!("drivers.motors: duplicate motor {}", driver.motor));
            }
            seen |= bit;
            if let Some(current) = driver.current_ma {
                if current > MOTOR_CURRENT_MAX_MA {
                    return Err(format!(
                        "drivers.motors: {} current_ma {current} out of range [0, {MOTOR_CURRENT_MAX_MA}]",
                        driver.motor
                    ));
                }
            }
        }
        Ok(())
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepperConfig {
    pub timer: TimerConfig,
    pub axes: AxesConfig,
    pub extruders: ExtruderConfig,
    pub endstops: EndstopConfig,
    pub drivers: DriverConfig,
}

impl StepperConfig {
    #[inline]
    pub fn steps_per_mm(&self, axis: Axis) -> f64 {
        self.axes.get(axis).steps_per_mm
    }
}

impl Validate for StepperConfig {
    fn validate(&self) -> Result<(), String> {
        self.timer.validate()?;
        self.axes.validate()?;
        self.extruders.validate()?;
        self.endstops.validate()?;
        self.drivers.validate()?;

        if self.endstops.dual_axis == Some(Axis::X)
            && self.extruders.dual_x_mode != DualXMode::Disabled
        {
            return Err("endstops.dual_axis = \"x\" conflicts with a dual X carriage".to_string());
        }
        for driver in &self.drivers.motors {
            if let Motor::E(n) = driver.motor {
                if n >= self.extruders.count {
                    return Err(format!(
                        "drivers.motors: {} but only {} extruders installed",
                        driver.motor, self.extruders.count
                    ));
                }
            }
        }
        Ok(())
    }
}
