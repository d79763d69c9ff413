//! User-interface objects for running chains
mod engine;

pub use engine::{
    builder, update_handler, BuildEngineError, Builder, ConvergenceDiagnostic,
    Engine,
};

pub mod error {
    pub use super::engine::error::*;
}
