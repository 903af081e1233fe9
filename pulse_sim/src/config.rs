//! Simulator configuration: shared settings, the machine, and the
//! simulated switch positions.
//!
//! ```toml
//! [shared]
//! service_name = "pulse-sim"
//! log_level = "info"
//!
//! [machine.axes.x]
//! steps_per_mm = 80.0
//!
//! [[machine.endstops.switches]]
//! id = "x_min"
//!
//! [sim]
//! time_scale = 0.0
//!
//! [[sim.switches]]
//! id = "x_min"
//! position_mm = -5.0
//! ```

use pulse_common::config::{SharedConfig, Validate};
use pulse_common::endstop::Endstop;
use pulse_common::machine::StepperConfig;
use serde::{Deserialize, Serialize};

/// Upper bound on `sim.time_scale`.
pub const TIME_SCALE_MAX: f64 = 1000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub machine: StepperConfig,
    #[serde(default)]
    pub sim: SimSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Wall-clock seconds per simulated second. `0` runs ticks back to back
    /// and disables overrun detection.
    pub time_scale: f64,
    /// CPU core the tick thread is pinned to (`rt` feature only).
    pub cpu_core: Option<usize>,
    /// Where each simulated switch closes.
    pub switches: Vec<SimSwitch>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            time_scale: 0.0,
            cpu_core: None,
            switches: Vec::new(),
        }
    }
}

/// A switch that closes when its motor reaches `position_mm` from the side
/// the switch faces: at or below for MIN, at or above for MAX.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimSwitch {
    pub id: Endstop,
    pub position_mm: f64,
}

impl Validate for SimSettings {
    fn validate(&self) -> Result<(), String> {
        if !self.time_scale.is_finite() || !(0.0..=TIME_SCALE_MAX).contains(&self.time_scale) {
            return Err(format!(
                "sim.time_scale {} out of range [0, {TIME_SCALE_MAX}]",
                self.time_scale
            ));
        }
        for (i, switch) in self.switches.iter().enumerate() {
            if !switch.position_mm.is_finite() {
                return Err(format!("sim.switches[{i}].position_mm is not finite"));
            }
            if self.switches[..i].iter().any(|s| s.id == switch.id) {
                return Err(format!("sim.switches: duplicate switch {}", switch.id));
            }
        }
        Ok(())
    }
}

impl Validate for SimConfig {
    fn validate(&self) -> Result<(), String> {
        self.shared.validate()?;
        self.machine.validate()?;
        self.sim.validate()?;
        let installed = self.machine.endstops.installed_mask();
        if let Some(switch) = self
            .sim
            .switches
            .iter()
            .find(|s| installed & s.id.mask() == 0)
        {
            return Err(format!(
                "sim.switches: {} is not installed in machine.endstops",
                switch.id
            ));
        }
        Ok(())
    }
}
