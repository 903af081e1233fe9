//! Job files: a TOML list of engine operations run in order.
//!
//! ```toml
//! name = "square"
//!
//! [[step]]
//! op = "move"
//! steps = [800, 0, 0, 0]
//! nominal_rate = 4000
//! entry_rate = 400
//! exit_rate = 400
//! accel_steps = 300
//! decel_steps = 300
//! acceleration = 20000
//!
//! [[step]]
//! op = "sync"
//! ```

use pulse_common::axis::{Axis, DualMotor};
use pulse_common::block::BlockSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "step", default)]
    pub steps: Vec<JobStep>,
}

/// One producer-side operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobStep {
    /// Enqueue a block, waiting for space.
    Move(BlockSpec),
    /// Wait for the queue to drain.
    Sync,
    SetPosition {
        x: i32,
        y: i32,
        z: i32,
        e: i32,
    },
    EnableEndstops {
        enabled: bool,
    },
    Homing {
        enabled: bool,
    },
    LockMotor {
        motor: DualMotor,
        locked: bool,
    },
    /// Acknowledge intentional switch contact.
    AckEndstops,
    Babystep {
        axis: Axis,
        forward: bool,
    },
    QuickStop,
}

impl Job {
    /// Moves in the job.
    pub fn move_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, JobStep::Move(_)))
            .count()
    }
}
