//! Configuration of the MCMC state and of a single MCMC step
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::alg::RowAssignAlg;
use crate::error::StepConfigError;
use crate::transition::StateTransition;
use dpclust_consts::{
    DEFAULT_CONC_PROB, DEFAULT_ERROR_RATE, DEFAULT_SM_PROB,
    N_RESTRICTED_SCANS, SPLIT_PROB,
};

/// How observations are assigned to clusters before the first step
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Every observation in cluster 0
    #[default]
    Together,
    /// Every observation in its own cluster
    Separate,
}

/// Shape of the Gamma prior on the CRP concentration
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationInit {
    /// Use `ln(n)` as the prior shape, or 1 when `n < 3`
    #[default]
    Auto,
    /// Use the given prior shape
    Value(f64),
}

impl ConcentrationInit {
    /// The Gamma prior shape for `n` observations
    pub fn prior_shape(&self, n: usize) -> f64 {
        match self {
            // ln(n) is not a valid shape for n = 1
            Self::Auto => (n as f64).ln().max(1.0),
            Self::Value(shape) => *shape,
        }
    }
}

/// Hyperparameters and initialization of a `State`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// Prior shape of the concentration parameter
    pub concentration: ConcentrationInit,
    /// Rate of the concentration prior
    pub concentration_rate: f64,
    /// Beta prior on cluster parameters
    pub beta_a: f64,
    pub beta_b: f64,
    /// Probability that a true 0 is observed as 1
    pub fp_rate: f64,
    /// Probability that a true 1 is observed as 0
    pub fn_rate: f64,
    pub init_mode: InitMode,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            concentration: ConcentrationInit::Auto,
            concentration_rate: 1.0,
            beta_a: 1.0,
            beta_b: 1.0,
            fp_rate: DEFAULT_ERROR_RATE,
            fn_rate: DEFAULT_ERROR_RATE,
            init_mode: InitMode::Together,
        }
    }
}

impl StateConfig {
    pub fn concentration(mut self, concentration: ConcentrationInit) -> Self {
        self.concentration = concentration;
        self
    }

    pub fn beta_prior(mut self, a: f64, b: f64) -> Self {
        self.beta_a = a;
        self.beta_b = b;
        self
    }

    pub fn error_rates(mut self, fp_rate: f64, fn_rate: f64) -> Self {
        self.fp_rate = fp_rate;
        self.fn_rate = fn_rate;
        self
    }

    pub fn init_mode(mut self, init_mode: InitMode) -> Self {
        self.init_mode = init_mode;
        self
    }
}

/// Which moves make up one MCMC step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StepConfig {
    /// Probability of a split-merge move instead of a Gibbs sweep
    pub sm_prob: f64,
    /// Probability of updating the concentration
    pub conc_prob: f64,
    /// Probability of proposing a split when both moves are possible
    pub split_prob: f64,
    /// Restricted Gibbs scans used to build launch states
    pub n_restricted_scans: usize,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            sm_prob: DEFAULT_SM_PROB,
            conc_prob: DEFAULT_CONC_PROB,
            split_prob: SPLIT_PROB,
            n_restricted_scans: N_RESTRICTED_SCANS,
        }
    }
}

fn check_prob(name: &'static str, p: f64) -> Result<(), StepConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(StepConfigError::InvalidProbability { name, value: p })
    }
}

impl StepConfig {
    pub fn sm_prob(mut self, sm_prob: f64) -> Self {
        self.sm_prob = sm_prob;
        self
    }

    pub fn conc_prob(mut self, conc_prob: f64) -> Self {
        self.conc_prob = conc_prob;
        self
    }

    pub fn validate(&self) -> Result<(), StepConfigError> {
        check_prob("sm_prob", self.sm_prob)?;
        check_prob("conc_prob", self.conc_prob)?;
        check_prob("split_prob", self.split_prob)
    }

    /// Draw the transitions of one step
    pub fn draw_transitions<R: Rng>(&self, rng: &mut R) -> Vec<StateTransition> {
        let mut transitions = Vec::with_capacity(3);

        let row_alg = if rng.gen::<f64>() < self.sm_prob {
            RowAssignAlg::SplitMerge {
                split_prob: self.split_prob,
                n_scans: self.n_restricted_scans,
            }
        } else {
            RowAssignAlg::Gibbs
        };
        transitions.push(StateTransition::RowAssignment(row_alg));
        transitions.push(StateTransition::ComponentParams);

        if rng.gen::<f64>() < self.conc_prob {
            transitions.push(StateTransition::Concentration);
        }

        transitions
    }
}
