use std::{
    fmt,
    sync::{mpsc::Sender, Arc, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

#[cfg(feature = "ctrlc_handler")]
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::cc::state::{Acceptance, State};
use crate::config::{RunConfig, RunMode};

/// How much of a run is left
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Remaining {
    /// A steps run of `n_steps` steps
    Steps { n_steps: usize },
    /// The most recent convergence diagnostic and its cutoff
    Convergence { psrf: f64, cutoff: f64 },
    /// Minutes until the deadline
    Minutes(f64),
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Steps { n_steps } => write!(f, "of {n_steps}"),
            Self::Convergence { psrf, cutoff } => {
                write!(f, "(PSRF {psrf:.4}, cutoff {cutoff})")
            }
            Self::Minutes(mins) => write!(f, "({mins:.1} min left)"),
        }
    }
}

/// A periodic summary of a run
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressReport {
    /// Number of completed steps
    pub step: usize,
    pub remaining: Remaining,
    pub n_clusters: usize,
    pub loglike: f64,
    /// Acceptance counters. Parameter counts cover the steps since the last
    /// report.
    pub acceptance: Acceptance,
}

/// Custom state inspector for `Engine::run`.
///
/// This trait can be used to implement progress capture and early stopping.
///
/// # Example
/// The following example stores the number of clusters after every step.
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use dpclust::cc::state::State;
/// use dpclust::data::BinaryMatrix;
/// use dpclust::update_handler::UpdateHandler;
/// use dpclust::{Builder, RunConfig};
///
/// #[derive(Debug, Clone, Default)]
/// pub struct ClusterCounts {
///     n_clusters: Arc<Mutex<Vec<usize>>>,
/// }
///
/// impl UpdateHandler for ClusterCounts {
///     fn state_updated(&mut self, _step: usize, state: &State) {
///         self.n_clusters.lock().unwrap().push(state.n_clusters());
///     }
/// }
///
/// let data = BinaryMatrix::new(vec![
///     vec![Some(true), Some(true), None],
///     vec![Some(true), Some(true), Some(false)],
///     vec![Some(false), Some(false), Some(true)],
/// ]).unwrap();
///
/// let mut engine = Builder::new(data).seed_from_u64(1337).build().unwrap();
/// let handler = ClusterCounts::default();
///
/// engine.run(&RunConfig::steps(20, 0.5), handler.clone()).unwrap();
///
/// assert_eq!(handler.n_clusters.lock().unwrap().len(), 20);
/// ```
pub trait UpdateHandler: Clone + Send + Sync {
    /// Initialize the handler.
    ///
    /// This method is called after the initial sample is recorded but before
    /// any step has occurred.
    fn global_init(&mut self, _config: &RunConfig, _state: &State) {}

    /// Handler for each step.
    ///
    /// This method is called after each step is complete.
    fn state_updated(&mut self, _step: usize, _state: &State) {}

    /// Handle a periodic progress report.
    fn progress(&mut self, _report: &ProgressReport) {}

    /// Should the `Engine` stop running.
    ///
    /// The method is called between steps. If a true is returned, the run
    /// ends and the trace holds the steps completed so far.
    fn stop_engine(&self) -> bool {
        false
    }

    /// Cleanup upon the end of the run.
    fn finalize(&mut self) {}
}

macro_rules! impl_tuple {
($($idx:tt $t:tt),+) => {
    impl<$($t,)+> UpdateHandler for ($($t,)+)
    where
        $($t: UpdateHandler,)+
    {

        fn global_init(&mut self, config: &RunConfig, state: &State) {
            $(
                self.$idx.global_init(config, state);
            )+
        }

        fn state_updated(&mut self, step: usize, state: &State) {
            $(
                self.$idx.state_updated(step, state);
            )+
        }

        fn progress(&mut self, report: &ProgressReport) {
            $(
                self.$idx.progress(report);
            )+
        }

        fn stop_engine(&self) -> bool {
            $(
                self.$idx.stop_engine()
            )||+
        }

        fn finalize(&mut self) {
            $(
                self.$idx.finalize();
            )+
        }

    }
};
}

impl_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_tuple!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_tuple!(0 A, 1 B, 2 C, 3 D);
impl_tuple!(0 A, 1 B, 2 C);
impl_tuple!(0 A, 1 B);
impl_tuple!(0 A);

impl<T> UpdateHandler for Vec<T>
where
    T: UpdateHandler,
{
    fn global_init(&mut self, config: &RunConfig, state: &State) {
        self.iter_mut()
            .for_each(|handler| handler.global_init(config, state));
    }

    fn state_updated(&mut self, step: usize, state: &State) {
        self.iter_mut().for_each(|handler| {
            handler.state_updated(step, state);
        })
    }

    fn progress(&mut self, report: &ProgressReport) {
        self.iter_mut().for_each(|handler| handler.progress(report));
    }

    fn stop_engine(&self) -> bool {
        self.iter().any(|handler| handler.stop_engine())
    }

    fn finalize(&mut self) {
        self.iter_mut().for_each(|handler| handler.finalize());
    }
}

impl UpdateHandler for () {}

/// Handle Ctrl-C (sigint) signals by stopping the Engine.
#[cfg(feature = "ctrlc_handler")]
#[derive(Clone)]
pub struct CtrlC {
    seen_sigint: Arc<AtomicBool>,
}

#[cfg(feature = "ctrlc_handler")]
impl Default for CtrlC {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "ctrlc_handler")]
impl CtrlC {
    /// Create a new `CtrlC` handler
    pub fn new() -> Self {
        let seen_sigint = Arc::new(AtomicBool::new(false));
        let r = seen_sigint.clone();

        ctrlc::set_handler(move || {
            r.store(true, Ordering::Relaxed);
        })
        .expect("Error setting Ctrl-C handler");

        Self { seen_sigint }
    }
}

#[cfg(feature = "ctrlc_handler")]
impl UpdateHandler for CtrlC {
    fn stop_engine(&self) -> bool {
        self.seen_sigint.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
/// An update handler which stops the run after a timeout limit.
pub enum Timeout {
    UnInitialized { timeout: Duration },
    Initialized { start: Instant, timeout: Duration },
}

impl Timeout {
    /// Create a new `Timeout` handler with `timeout` duration.
    pub fn new(timeout: Duration) -> Self {
        Self::UnInitialized { timeout }
    }
}

impl UpdateHandler for Timeout {
    fn global_init(&mut self, _config: &RunConfig, _state: &State) {
        if let Self::UnInitialized { timeout } = self {
            *self = Self::Initialized {
                start: Instant::now(),
                timeout: *timeout,
            };
        };
    }

    fn stop_engine(&self) -> bool {
        match self {
            Self::Initialized { start, timeout } => start.elapsed() > *timeout,
            Self::UnInitialized { .. } => false,
        }
    }
}

/// Route progress reports through `log::info!`
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl UpdateHandler for LogProgress {
    fn progress(&mut self, report: &ProgressReport) {
        let acc = &report.acceptance;
        info!(
            "Step {} {}: {} clusters, loglike {:.2}, params acc {:.2}, \
             splits {}/{}, merges {}/{}",
            report.step,
            report.remaining,
            report.n_clusters,
            report.loglike,
            acc.params.ratio().unwrap_or(f64::NAN),
            acc.splits.accepted,
            acc.splits.total(),
            acc.merges.accepted,
            acc.merges.total(),
        );
    }
}

const UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Lets an event through at most once per interval
#[derive(Clone, Copy, Debug)]
struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn ready(&mut self) -> bool {
        let ready = self
            .last
            .map_or(true, |last| last.elapsed() >= self.interval);
        if ready {
            self.last = Some(Instant::now());
        }
        ready
    }
}

/// Add a progress bar to the output
#[derive(Clone)]
pub enum ProgressBar {
    UnInitialized,
    Initialized {
        sender: Arc<Mutex<Sender<(usize, f64)>>>,
        handle: Arc<Mutex<Option<JoinHandle<()>>>>,
        throttle: Throttle,
    },
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::UnInitialized
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::UnInitialized
    }
}

impl UpdateHandler for ProgressBar {
    fn global_init(&mut self, config: &RunConfig, _state: &State) {
        let (sender, receiver) = std::sync::mpsc::channel::<(usize, f64)>();
        let n_steps = match config.mode {
            RunMode::Steps { n_steps, .. } => Some(n_steps),
            _ => None,
        };

        let handle = std::thread::spawn(move || {
            use indicatif::ProgressStyle;

            let progress_bar = match n_steps {
                Some(n) => {
                    let style = ProgressStyle::default_bar().template(
    "Score {msg} {wide_bar:.white/white} │{pos}/{len}, Elapsed {elapsed_precise} ETA {eta_precise}│",
).unwrap().progress_chars("━╾ ");
                    let bar = indicatif::ProgressBar::new(n as u64);
                    bar.set_style(style);
                    bar
                }
                None => {
                    let style = ProgressStyle::default_spinner()
                        .template(
                            "Score {msg} {spinner} │{pos} steps, Elapsed {elapsed_precise}│",
                        )
                        .unwrap();
                    let bar = indicatif::ProgressBar::new_spinner();
                    bar.set_style(style);
                    bar
                }
            };

            while let Ok((step, log_score)) = receiver.recv() {
                progress_bar.set_position(step as u64);
                progress_bar.set_message(format!("{log_score:.2}"));
            }

            progress_bar.finish_and_clear();
        });

        *self = Self::Initialized {
            sender: Arc::new(Mutex::new(sender)),
            handle: Arc::new(Mutex::new(Some(handle))),
            throttle: Throttle::new(UPDATE_INTERVAL),
        }
    }

    fn state_updated(&mut self, step: usize, state: &State) {
        if let Self::Initialized {
            sender, throttle, ..
        } = self
        {
            // the score is only computed when the bar will redraw
            if !throttle.ready() {
                return;
            }
            // a closed channel only means the bar is gone
            if let Ok(sender) = sender.lock() {
                let _ = sender.send((step, state.log_posterior()));
            }
        }
    }

    fn finalize(&mut self) {
        if let Self::Initialized { sender, handle, .. } = std::mem::take(self)
        {
            std::mem::drop(sender);

            if let Ok(mut handle) = handle.lock() {
                if let Some(handle) = handle.take() {
                    let _ = handle.join();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::config::StateConfig;
    use crate::cc::state::MoveCounter;
    use crate::data::BinaryMatrix;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[derive(Clone)]
    struct StopAfter(usize, usize);

    impl UpdateHandler for StopAfter {
        fn state_updated(&mut self, step: usize, _state: &State) {
            self.1 = step;
        }

        fn stop_engine(&self) -> bool {
            self.1 >= self.0
        }
    }

    #[test]
    fn tuple_stops_if_any_member_stops() {
        let handler = (StopAfter(10, 3), StopAfter(2, 3), ());
        assert!(handler.stop_engine());
        let handler = (StopAfter(5, 0), ());
        assert!(!handler.stop_engine());
    }

    #[test]
    fn tuple_does_not_stop_until_a_member_does() {
        let mut handler = (StopAfter(4, 0), StopAfter(6, 0));
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let data = BinaryMatrix::new(vec![vec![Some(true)]]).unwrap();
        let state =
            State::new(data, &StateConfig::default(), &mut rng).unwrap();
        for step in 1..=3 {
            handler.state_updated(step, &state);
            assert!(!handler.stop_engine());
        }
        handler.state_updated(4, &state);
        assert!(handler.stop_engine());
    }

    #[test]
    fn throttle_lets_one_event_through_per_interval() {
        let mut throttle = Throttle::new(Duration::from_secs(3600));
        assert!(throttle.ready());
        assert!(!throttle.ready());
        assert!(!throttle.ready());

        let mut open = Throttle::new(Duration::ZERO);
        assert!(open.ready());
        assert!(open.ready());
    }

    #[test]
    fn vec_stops_if_any_member_stops() {
        assert!(vec![StopAfter(5, 0), StopAfter(1, 1)].stop_engine());
        assert!(!Vec::<StopAfter>::new().stop_engine());
    }

    #[test]
    fn uninitialized_timeout_does_not_stop() {
        let timeout = Timeout::new(Duration::from_secs(0));
        assert!(!timeout.stop_engine());
    }

    #[test]
    fn remaining_display() {
        assert_eq!(Remaining::Steps { n_steps: 10 }.to_string(), "of 10");
        assert_eq!(Remaining::Minutes(2.5).to_string(), "(2.5 min left)");
        let report = ProgressReport {
            step: 3,
            remaining: Remaining::Convergence {
                psrf: 1.2,
                cutoff: 1.1,
            },
            n_clusters: 2,
            loglike: -10.0,
            acceptance: Acceptance {
                params: MoveCounter {
                    accepted: 1,
                    rejected: 1,
                },
                ..Default::default()
            },
        };
        assert_eq!(
            report.remaining.to_string(),
            "(PSRF 1.2000, cutoff 1.1)"
        );
        let mut log = LogProgress;
        log.progress(&report);
    }
}
