//! Pulse Common Library
//!
//! Types shared by every crate of the pulse workspace: the planner → engine
//! block contract, axis and motor identifiers, limit switch identifiers,
//! machine configuration and its TOML loader, and fault bitflags.
//!
//! # Module Structure
//!
//! - [`axis`] - Logical axes, physical motors, dual-motor selectors
//! - [`block`] - Motion block model and admission rules
//! - [`endstop`] - Limit switch identifiers
//! - [`machine`] - Engine configuration sections (timer, axes, extruders, endstops, drivers)
//! - [`config`] - Configuration loading traits and types
//! - [`error`] - Fault bitflags surfaced by the diagnostics interface
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pulse_common::prelude::*;
//!
//! let block = Block::try_from(BlockSpec {
//!     steps: [1000, 500, 0, 0],
//!     nominal_rate: 1000,
//!     entry_rate: 100,
//!     exit_rate: 100,
//!     accel_steps: 200,
//!     decel_steps: 200,
//!     acceleration: 2475,
//!     ..Default::default()
//! })
//! .unwrap();
//! assert_eq!(block.dominant_axis(), Axis::X);
//! ```

pub mod axis;
pub mod block;
pub mod config;
pub mod consts;
pub mod endstop;
pub mod error;
pub mod machine;
pub mod prelude;
