//! Configuration of `Engine::run`
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::cc::config::StepConfig;
use crate::defaults;
use crate::error::{ConfigFileError, RunConfigError};

/// When a run stops and how much of it is burn-in
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Run a fixed number of steps
    Steps {
        n_steps: usize,
        /// Fraction of the samples discarded as burn-in
        burn_in: f64,
    },
    /// Run until the lugsail PSRF of the log likelihood falls to `cutoff`.
    /// The second half of the trace is kept.
    Convergence {
        #[serde(default = "default_cutoff")]
        cutoff: f64,
    },
    /// Run until the wall clock reaches `end`
    Deadline {
        end: SystemTime,
        /// Fraction of the samples discarded as burn-in
        burn_in: f64,
    },
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Steps { n_steps, .. } => write!(f, "{n_steps} steps"),
            Self::Convergence { cutoff } => {
                write!(f, "convergence (cutoff {cutoff})")
            }
            Self::Deadline { .. } => write!(f, "deadline"),
        }
    }
}

impl RunMode {
    /// Minimum number of steps of a convergence run with `cutoff`
    pub fn min_convergence_steps(cutoff: f64) -> usize {
        (1.0 / (cutoff * cutoff - 1.0)).floor() as usize
    }
}

fn default_cutoff() -> f64 {
    defaults::CONVERGENCE_CUTOFF
}

fn check_burn_in(burn_in: f64) -> Result<(), RunConfigError> {
    if (0.0..1.0).contains(&burn_in) {
        Ok(())
    } else {
        Err(RunConfigError::InvalidBurnIn(burn_in))
    }
}

/// Configuration for `Engine::run`
///
/// Sets the stopping policy and the moves that make up each step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub mode: RunMode,
    #[serde(default)]
    pub step: StepConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: defaults::RUN_MODE,
            step: StepConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn steps(n_steps: usize, burn_in: f64) -> Self {
        Self {
            mode: RunMode::Steps { n_steps, burn_in },
            step: StepConfig::default(),
        }
    }

    pub fn convergence(cutoff: f64) -> Self {
        Self {
            mode: RunMode::Convergence { cutoff },
            step: StepConfig::default(),
        }
    }

    pub fn deadline(end: SystemTime, burn_in: f64) -> Self {
        Self {
            mode: RunMode::Deadline { end, burn_in },
            step: StepConfig::default(),
        }
    }

    #[must_use]
    pub fn sm_prob(mut self, sm_prob: f64) -> Self {
        self.step.sm_prob = sm_prob;
        self
    }

    #[must_use]
    pub fn conc_prob(mut self, conc_prob: f64) -> Self {
        self.step.conc_prob = conc_prob;
        self
    }

    #[must_use]
    pub fn step_config(mut self, step: StepConfig) -> Self {
        self.step = step;
        self
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.step.validate()?;
        match self.mode {
            RunMode::Steps { n_steps, burn_in } => {
                if n_steps == 0 {
                    return Err(RunConfigError::ZeroSteps);
                }
                check_burn_in(burn_in)
            }
            RunMode::Convergence { cutoff } => {
                // also rejects NaN
                if cutoff > 1.0 {
                    Ok(())
                } else {
                    Err(RunConfigError::InvalidCutoff(cutoff))
                }
            }
            RunMode::Deadline { burn_in, .. } => check_burn_in(burn_in),
        }
    }

    /// Read and validate a run configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, ConfigFileError> {
        let file = File::open(path)?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_file<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), ConfigFileError> {
        let file = File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}
