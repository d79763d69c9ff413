use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use super::error::BuildEngineError;
use super::{ConvergenceDiagnostic, Engine};
use crate::cc::config::{ConcentrationInit, InitMode, StateConfig};
use crate::data::BinaryMatrix;

/// Builds `Engine`s
pub struct Builder {
    data: BinaryMatrix,
    state_config: StateConfig,
    seed: Option<u64>,
    diagnostic: Option<ConvergenceDiagnostic>,
}

impl Builder {
    #[must_use]
    pub fn new(data: BinaryMatrix) -> Self {
        Self {
            data,
            state_config: StateConfig::default(),
            seed: None,
            diagnostic: None,
        }
    }

    /// With a complete state configuration
    #[must_use]
    pub fn state_config(mut self, state_config: StateConfig) -> Self {
        self.state_config = state_config;
        self
    }

    /// With a given prior shape of the concentration
    #[must_use]
    pub fn concentration(mut self, concentration: ConcentrationInit) -> Self {
        self.state_config.concentration = concentration;
        self
    }

    /// With false-positive and false-negative rates
    #[must_use]
    pub fn error_rates(mut self, fp_rate: f64, fn_rate: f64) -> Self {
        self.state_config.fp_rate = fp_rate;
        self.state_config.fn_rate = fn_rate;
        self
    }

    /// With a Beta(a, b) prior on cluster parameters
    #[must_use]
    pub fn beta_prior(mut self, a: f64, b: f64) -> Self {
        self.state_config.beta_a = a;
        self.state_config.beta_b = b;
        self
    }

    #[must_use]
    pub fn init_mode(mut self, init_mode: InitMode) -> Self {
        self.state_config.init_mode = init_mode;
        self
    }

    /// With a given random number generator
    #[must_use]
    pub fn seed_from_u64(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// With a convergence diagnostic other than the lugsail PSRF
    #[must_use]
    pub fn convergence_diagnostic(
        mut self,
        diagnostic: ConvergenceDiagnostic,
    ) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }

    // Build the `Engine`; consume the `Builder`.
    pub fn build(self) -> Result<Engine, BuildEngineError> {
        let rng = match self.seed {
            Some(s) => Xoshiro256Plus::seed_from_u64(s),
            None => Xoshiro256Plus::from_entropy(),
        };

        let mut engine = Engine::new(self.data, &self.state_config, rng)?;
        if let Some(diagnostic) = self.diagnostic {
            engine.diagnostic = diagnostic;
        }
        Ok(engine)
    }
}
