//! Errors returned by producer-side operations.
//!
//! The tick context has no error path; see [`crate::diagnostics`].

use pulse_common::axis::{Axis, Motor};
use pulse_common::block::BlockError;
use pulse_common::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepperError {
    /// Operation requires an idle engine.
    #[error("engine busy: {pending} block(s) queued or executing")]
    Busy { pending: u32 },

    #[error("block queue full ({capacity} blocks)")]
    QueueFull { capacity: usize },

    #[error("invalid block: {0}")]
    InvalidBlock(#[from] BlockError),

    #[error("block selects extruder {index} but only {count} installed")]
    ExtruderNotInstalled { index: u8, count: u8 },

    #[error("babystep not supported on axis {0}")]
    BabystepAxis(Axis),

    #[error("no step port installed for motor {0}")]
    MissingPort(Motor),

    #[error("driver {motor}: {reason}")]
    Driver { motor: Motor, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
