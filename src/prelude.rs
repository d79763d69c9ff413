//! Common import for general use.

pub use crate::{
    update_handler, Builder, Engine, RunConfig, RunMode, StateTransition,
};

pub use dpclust_cc::{
    alg::RowAssignAlg,
    config::{ConcentrationInit, InitMode, StateConfig, StepConfig},
    state::State,
    trace::Trace,
};
pub use dpclust_data::BinaryMatrix;
pub use dpclust_stats::rv;
pub use dpclust_utils as utils;
