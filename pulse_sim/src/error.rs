//! Simulator error type.

use crate::runner::RunnerError;
use pulse_common::config::ConfigError;
use pulse_stepper::StepperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("engine: {0}")]
    Stepper(#[from] StepperError),

    #[error("tick thread: {0}")]
    Runner(#[from] RunnerError),

    #[error("job step {index}: {source}")]
    JobStep {
        index: usize,
        #[source]
        source: StepperError,
    },
}
