//! Numeric constants and defaults shared by the dpclust crates
pub use rv;

/// Smallest probability any density evaluation is allowed to see. Matches the
/// resolution of a 64-bit float.
pub const EPSILON: f64 = 1E-15;

/// `EPSILON.ln()`
pub const LN_EPSILON: f64 = -34.538_776_394_910_684;

/// Initial candidate step sizes of the truncated-normal parameter proposal
pub const DEFAULT_PROPOSAL_SCALES: [f64; 3] = [0.1, 0.25, 0.5];

/// Step sizes used when adaptation has pushed every candidate to 1
pub const RESEED_PROPOSAL_SCALES: [f64; 3] = [0.8, 0.9, 1.0];

/// Multiplicative factor of step-size adaptation
pub const PROPOSAL_ADAPT_FACTOR: f64 = 1.5;

/// Lower edge of the target MH acceptance band
pub const TARGET_ACCEPT_LOWER: f64 = 0.45;

/// Upper edge of the target MH acceptance band
pub const TARGET_ACCEPT_UPPER: f64 = 0.55;

/// Probability of proposing a split when both moves are possible
pub const SPLIT_PROB: f64 = 0.75;

/// Number of restricted Gibbs scans used to build a launch state
pub const N_RESTRICTED_SCANS: usize = 5;

/// Default probability of a split-merge step instead of a Gibbs sweep
pub const DEFAULT_SM_PROB: f64 = 0.33;

/// Default probability of updating the concentration parameter
pub const DEFAULT_CONC_PROB: f64 = 0.1;

/// Default false-positive and false-negative rate
pub const DEFAULT_ERROR_RATE: f64 = EPSILON;

/// Number of steps between convergence checks
pub const PSRF_INTERVAL: usize = 500;

/// Maximum number of trace rows appended when the trace runs out of room
pub const TRACE_BLOCK_SIZE: usize = 200;

/// Initial trace capacity of deadline runs
pub const DEADLINE_INITIAL_CAPACITY: usize = 500;

/// Number of steps between progress reports of deadline runs
pub const DEADLINE_REPORT_INTERVAL: usize = 1000;
