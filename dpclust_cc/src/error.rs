use thiserror::Error;

use dpclust_stats::assignment::AssignmentError;
use dpclust_stats::likelihood::ErrorModelError;
use dpclust_stats::prior_process::BuildProcessError;

/// Errors that can arise when creating a new `State`
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NewStateError {
    #[error("invalid observation model: {0}")]
    Likelihood(#[from] ErrorModelError),
    #[error("invalid concentration prior: {0}")]
    Process(#[from] BuildProcessError),
    #[error("invalid initial assignment: {0}")]
    Assignment(#[from] AssignmentError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepConfigError {
    #[error("{name} must be in [0, 1]; got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
}
