//! Bayesian nonparametric clustering of noisy binary observations.
//!
//! Observations are vectors of ones, zeros, and missing values. They are
//! clustered with a Dirichlet process mixture whose components hold one
//! success probability per feature. Observed values pass through a
//! false-positive and false-negative error model. Inference is by MCMC:
//! Gibbs reassignment, Jain & Neal non-conjugate split-merge,
//! Metropolis-Hastings updates of the component parameters, and Escobar &
//! West updates of the concentration.
//!
//! # Example
//!
//! Two groups of observations with complementary profiles.
//!
//! ```rust
//! use dpclust::prelude::*;
//!
//! let rows: Vec<Vec<Option<bool>>> = (0..20)
//!     .map(|ix| {
//!         (0..8).map(|jx| Some((ix % 2 == 0) == (jx % 2 == 0))).collect()
//!     })
//!     .collect();
//! let data = BinaryMatrix::new(rows).unwrap();
//!
//! let mut engine = Builder::new(data)
//!     .error_rates(0.01, 0.01)
//!     .seed_from_u64(1337)
//!     .build()
//!     .unwrap();
//!
//! let trace = engine.run(&RunConfig::steps(200, 0.5), ()).unwrap();
//! assert_eq!(trace.len(), 201);
//!
//! let map_step = trace.map_index().unwrap();
//! assert!(map_step >= trace.burn_in());
//! ```
#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone,
    clippy::perf
)]

pub mod config;
pub mod defaults;
mod interface;
pub mod prelude;

pub use config::{RunConfig, RunMode};

pub use interface::{
    builder, update_handler, BuildEngineError, Builder, ConvergenceDiagnostic,
    Engine,
};

pub mod error {
    pub use super::interface::error::*;
}

pub use dpclust_cc::trace::Trace;
pub use dpclust_cc::transition::StateTransition;

pub mod consts {
    pub use dpclust_consts::*;
}

pub mod data {
    pub use dpclust_data::*;
}

pub mod cc {
    pub use dpclust_cc::*;
}

pub mod stats {
    pub use dpclust_stats::*;
}

pub mod utils {
    pub use dpclust_utils::*;
}
