//! Algorithms for reassigning observations to clusters
//!
//! ## Gibbs
//!
//! Each observation is removed from its cluster and reinserted according to
//! its likelihood under every cluster and the CRP weight of the cluster's
//! size. A new cluster is opened with probability proportional to the
//! marginal of the observation under the prior.
//!
//! Neal, R. M. (2000). Markov chain sampling methods for Dirichlet process
//!     mixture models. Journal of computational and graphical statistics, 9(2),
//!     249-265.
//!
//! ## Non-conjugate split-merge
//!
//! Proposes splitting one cluster in two, or merging two clusters, using
//! launch states built by restricted Gibbs scans over the cluster parameters
//! and the assignment of the affected observations.
//!
//! Jain, S., & Neal, R. M. (2007). Splitting and merging components of a
//!     nonconjugate Dirichlet process mixture model. Bayesian Analysis, 2(3),
//!     445-472.
use serde::{Deserialize, Serialize};
use std::fmt;

/// The MCMC algorithm to use for row reassignment
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RowAssignAlg {
    /// Sequential, enumerative Gibbs
    Gibbs,
    /// Restricted Gibbs split-merge
    SplitMerge {
        /// Probability of proposing a split when a merge is also possible
        split_prob: f64,
        /// Number of restricted scans used to build each launch state
        n_scans: usize,
    },
}

impl fmt::Display for RowAssignAlg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Gibbs => write!(f, "gibbs"),
            Self::SplitMerge { .. } => write!(f, "split_merge"),
        }
    }
}
