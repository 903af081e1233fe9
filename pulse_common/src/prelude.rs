//! Common re-exports for convenience.
//!
//! ```rust
//! use pulse_common::prelude::*;
//! ```

pub use crate::axis::{Axis, AxisArray, DualMotor, Motor};
pub use crate::block::{Block, BlockError, BlockSpec, DirectionBits};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};
pub use crate::consts::*;
pub use crate::endstop::{Endstop, EndstopSide};
pub use crate::error::FaultFlags;
pub use crate::machine::{
    AxesConfig, AxisConfig, DriverConfig, DriverSettings, DualXMode, EndstopConfig,
    ExtruderConfig, MicrostepMode, StepperConfig, SwitchConfig, TimerConfig,
};
