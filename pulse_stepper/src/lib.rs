//! # Pulse Stepper Engine
//!
//! Real-time execution core of the pulse motion stack. Consumes a FIFO of
//! planner blocks and turns each into timed step/dir pulses on up to four
//! logical axes, while sampling limit switches for safety aborts.
//!
//! ## Execution Contexts
//!
//! 1. **Producer** ([`Stepper`]) - enqueues blocks, runs control operations,
//!    logs, reads positions and diagnostics.
//! 2. **Tick** ([`TickContext`]) - driven by a periodic timer; owns the
//!    current block, Bresenham state and timing cursor exclusively.
//!
//! The two contexts share only atomics and a lock-free block queue. The tick
//! context never blocks, never allocates and never logs.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pulse_common::prelude::*;
//! use pulse_stepper::{init, ManualTickSource, NullEndstops, PortTable};
//!
//! let source = Arc::new(ManualTickSource::new());
//! let (ports, _logs) = PortTable::recording();
//! let (stepper, mut tick) = init(
//!     &StepperConfig::default(),
//!     ports,
//!     Box::new(NullEndstops),
//!     source.clone(),
//! )
//! .unwrap();
//!
//! let block = Block::try_from(BlockSpec::constant_rate([200, 100, 0, 0], 1000)).unwrap();
//! stepper.push_block(block).unwrap();
//! stepper.synchronize_with(|| {
//!     tick.tick();
//! });
//! assert_eq!(stepper.position(Axis::X), 200);
//! assert_eq!(stepper.position(Axis::Y), 100);
//! ```

pub mod babystep;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod port;
pub mod position;
pub mod queue;
pub mod safety;
pub mod step;
pub mod tick;

pub use diagnostics::StepperFaults;
pub use driver::{DriverControl, MicrostepReadings};
pub use error::StepperError;
pub use lifecycle::{ManualTickSource, Stepper, TickSource, init};
pub use port::{PortLog, PortLogs, PortTable, RecordingPort, StepPort};
pub use safety::endstops::{EndstopInputs, NullEndstops};
pub use safety::hits::{EndstopHit, EndstopReport};
pub use safety::stop::QuickStopHandle;
pub use step::profile::{Phase, PhaseEvents};
pub use tick::{Tick, TickContext};
