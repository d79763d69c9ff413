use std::io;

use dpclust_cc::error::{NewStateError, StepConfigError};
use thiserror::Error;

/// Errors that can arise when building an `Engine`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildEngineError {
    /// The initial state could not be created
    #[error("error constructing the initial state: {0}")]
    NewState(#[from] NewStateError),
}

/// Invalid run configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunConfigError {
    #[error("invalid step configuration: {0}")]
    Step(#[from] StepConfigError),
    /// Burn-in fractions must be in [0, 1)
    #[error("burn-in fraction must be in [0, 1); got {0}")]
    InvalidBurnIn(f64),
    /// The convergence cutoff must be greater than 1
    #[error("convergence cutoff must be greater than 1; got {0}")]
    InvalidCutoff(f64),
    #[error("a steps run must take at least one step")]
    ZeroSteps,
}

/// Errors that can arise when reading or writing a run configuration file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid run configuration: {0}")]
    Invalid(#[from] RunConfigError),
}

/// Errors that can arise during `Engine::run`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(#[from] RunConfigError),
}
