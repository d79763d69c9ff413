//! The main interface to dpclust models
pub mod builder;
pub mod error;
pub mod update_handler;

pub use builder::Builder;
pub use error::{BuildEngineError, ConfigFileError, RunConfigError, RunError};

use std::time::SystemTime;

use log::{debug, info};
use rand_xoshiro::Xoshiro256Plus;

use crate::cc::config::StateConfig;
use crate::cc::state::State;
use crate::cc::trace::Trace;
use crate::config::{RunConfig, RunMode};
use crate::consts::{
    DEADLINE_INITIAL_CAPACITY, DEADLINE_REPORT_INTERVAL, PSRF_INTERVAL,
};
use crate::data::BinaryMatrix;
use crate::stats::convergence::lugsail_psrf;
use update_handler::{ProgressReport, Remaining, UpdateHandler};

/// Convergence diagnostic of a trace. Takes the trace, the burn-in index,
/// and the number of samples; higher values mean less converged.
pub type ConvergenceDiagnostic = fn(&[f64], usize, usize) -> f64;

/// Runs a single MCMC chain over a binary data set
#[derive(Clone)]
pub struct Engine {
    state: State,
    rng: Xoshiro256Plus,
    diagnostic: ConvergenceDiagnostic,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("n_rows", &self.state.n_rows())
            .field("n_cols", &self.state.n_cols())
            .field("n_clusters", &self.state.n_clusters())
            .finish()
    }
}

impl Engine {
    /// Create a new engine with a freshly initialized state
    pub fn new(
        data: BinaryMatrix,
        config: &StateConfig,
        mut rng: Xoshiro256Plus,
    ) -> Result<Self, BuildEngineError> {
        let state = State::new(data, config, &mut rng)?;
        Ok(Self {
            state,
            rng,
            diagnostic: lugsail_psrf,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    fn report<U: UpdateHandler>(
        &mut self,
        step: usize,
        remaining: Remaining,
        handler: &mut U,
    ) {
        let report = ProgressReport {
            step,
            remaining,
            n_clusters: self.state.n_clusters(),
            loglike: self.state.loglike(),
            acceptance: self.state.acceptance().clone(),
        };
        handler.progress(&report);
        self.state.reset_param_acceptance();
    }

    fn step<U: UpdateHandler>(
        &mut self,
        config: &RunConfig,
        step: usize,
        trace: &mut Trace,
        handler: &mut U,
    ) {
        let transitions = config.step.draw_transitions(&mut self.rng);
        self.state.step(&transitions, &mut self.rng);
        trace.push(&self.state);
        handler.state_updated(step, &self.state);
    }

    /// Run the chain until the stopping policy of `config.mode` is met, or
    /// until `update_handler` asks to stop. Returns the trace, which
    /// includes the initial state as its first sample.
    ///
    /// # Example
    ///
    /// ```
    /// use dpclust::data::BinaryMatrix;
    /// use dpclust::{Builder, RunConfig};
    ///
    /// let data = BinaryMatrix::new(vec![
    ///     vec![Some(true), Some(true), Some(false)],
    ///     vec![Some(true), None, Some(false)],
    ///     vec![Some(false), Some(false), Some(true)],
    ///     vec![Some(false), Some(false), None],
    /// ]).unwrap();
    ///
    /// let mut engine = Builder::new(data)
    ///     .error_rates(0.01, 0.05)
    ///     .seed_from_u64(1337)
    ///     .build()
    ///     .unwrap();
    ///
    /// let trace = engine.run(&RunConfig::steps(100, 0.5), ()).unwrap();
    ///
    /// assert_eq!(trace.len(), 101);
    /// assert_eq!(trace.burn_in(), 50);
    /// ```
    pub fn run<U>(
        &mut self,
        config: &RunConfig,
        mut update_handler: U,
    ) -> Result<Trace, RunError>
    where
        U: UpdateHandler,
    {
        config.validate()?;

        info!(
            "Starting {} run on {} observations of {} features",
            config.mode,
            self.state.n_rows(),
            self.state.n_cols()
        );

        let n_cols = self.state.n_cols();
        let mut trace = match config.mode {
            RunMode::Steps { n_steps, .. } => {
                Trace::with_capacity(n_steps + 1, n_cols)
            }
            // the minimum run length of a tight cutoff can be astronomical,
            // so the trace grows on demand
            RunMode::Convergence { .. } => {
                Trace::with_capacity(PSRF_INTERVAL + 1, n_cols)
            }
            RunMode::Deadline { .. } => {
                Trace::with_capacity(DEADLINE_INITIAL_CAPACITY, n_cols)
            }
        };
        trace.push(&self.state);

        update_handler.global_init(config, &self.state);

        let mut step: usize = 0;
        let burn_in = match config.mode {
            RunMode::Steps { n_steps, burn_in } => {
                let report_interval = (n_steps / 10).max(1);
                while step < n_steps && !update_handler.stop_engine() {
                    step += 1;
                    self.step(config, step, &mut trace, &mut update_handler);
                    if step % report_interval == 0 {
                        let remaining = Remaining::Steps { n_steps };
                        self.report(step, remaining, &mut update_handler);
                    }
                }
                (trace.len() as f64 * burn_in).floor() as usize
            }
            RunMode::Convergence { cutoff } => {
                let min_steps = RunMode::min_convergence_steps(cutoff);
                while !update_handler.stop_engine() {
                    step += 1;
                    self.step(config, step, &mut trace, &mut update_handler);
                    if step % PSRF_INTERVAL == 0 {
                        let psrf =
                            (self.diagnostic)(trace.loglike(), step / 2, trace.len());
                        debug!("PSRF at step {step}: {psrf:.4}");
                        let remaining = Remaining::Convergence { psrf, cutoff };
                        self.report(step, remaining, &mut update_handler);
                        if psrf <= cutoff && step > min_steps {
                            info!("Converged after {step} steps (PSRF {psrf:.4})");
                            break;
                        }
                    }
                }
                step / 2
            }
            RunMode::Deadline { end, burn_in } => {
                while SystemTime::now() < end && !update_handler.stop_engine() {
                    step += 1;
                    self.step(config, step, &mut trace, &mut update_handler);
                    if step % DEADLINE_REPORT_INTERVAL == 0 {
                        let mins = end
                            .duration_since(SystemTime::now())
                            .map_or(0.0, |left| left.as_secs_f64() / 60.0);
                        let remaining = Remaining::Minutes(mins);
                        self.report(step, remaining, &mut update_handler);
                    }
                }
                (trace.len() as f64 * burn_in).floor() as usize
            }
        };

        trace.finish(burn_in);

        let acceptance = self.state.acceptance();
        info!(
            "Finished after {} steps: {} clusters, alpha {:.3}, splits {}/{}, \
             merges {}/{}",
            step,
            self.state.n_clusters(),
            self.state.alpha(),
            acceptance.splits.accepted,
            acceptance.splits.total(),
            acceptance.merges.accepted,
            acceptance.merges.total(),
        );

        update_handler.finalize();

        Ok(trace)
    }
}
