//! Engine configuration loading.
//!
//! Wraps the shared TOML loader with the engine's semantic checks and logs
//! what was loaded.

use crate::error::StepperError;
use pulse_common::config::{ConfigError, ConfigLoader, Validate};
use pulse_common::machine::StepperConfig;
use std::path::Path;
use tracing::{debug, info};

/// Load and validate the machine configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<StepperConfig, StepperError> {
    let config = StepperConfig::load_validated(path)?;
    info!(path = %path.display(), "stepper configuration loaded");
    log_summary(&config);
    Ok(config)
}

/// Same as [`load_config`] from an in-memory string.
pub fn load_config_from_str(toml: &str) -> Result<StepperConfig, StepperError> {
    let config = StepperConfig::from_toml_validated(toml)?;
    log_summary(&config);
    Ok(config)
}

/// Validate a configuration built in code.
pub fn validate(config: &StepperConfig) -> Result<(), StepperError> {
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e).into())
}

fn log_summary(config: &StepperConfig) {
    debug!(
        timer_hz = config.timer.frequency_hz,
        max_step_frequency = config.timer.max_step_frequency,
        extruders = config.extruders.count,
        dual_x_mode = ?config.extruders.dual_x_mode,
        switches = config.endstops.switches.len(),
        dual_axis = ?config.endstops.dual_axis,
        "stepper configuration"
    );
}
