//! Default values
use crate::config::RunMode;

/// Default number of steps of a steps run
pub const N_STEPS: usize = 1000;

/// Default fraction of samples discarded as burn-in
pub const BURN_IN: f64 = 0.5;

/// Default lugsail PSRF cutoff of a convergence run
pub const CONVERGENCE_CUTOFF: f64 = 1.05;

/// Default run mode
pub const RUN_MODE: RunMode = RunMode::Steps {
    n_steps: N_STEPS,
    burn_in: BURN_IN,
};
