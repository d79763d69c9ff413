mod gibbs;
mod params;
mod split_merge;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::alg::RowAssignAlg;
use crate::config::{InitMode, StateConfig};
use crate::error::NewStateError;
use crate::transition::StateTransition;
use dpclust_data::{BinaryMatrix, RowSummary};
use dpclust_stats::assignment::Assignment;
use dpclust_stats::likelihood::{BinaryLikelihood, FeatureCounts};
use dpclust_stats::mh::{ProposalScales, ScaleAdaptation};
use dpclust_stats::prior_process::{Dirichlet, PriorProcessT};

pub use params::walk_cluster_params;

/// Accept/reject tally of one kind of Metropolis-Hastings move
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveCounter {
    pub accepted: u64,
    pub rejected: u64,
}

impl MoveCounter {
    #[inline]
    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }

    #[inline]
    pub fn add(&mut self, n_accepted: usize, n_total: usize) {
        self.accepted += n_accepted as u64;
        self.rejected += (n_total - n_accepted) as u64;
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Fraction of accepted moves, or `None` if nothing was proposed
    pub fn ratio(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            None
        } else {
            Some(self.accepted as f64 / total as f64)
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Acceptance counters of the parameter, split, and merge moves
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Acceptance {
    pub params: MoveCounter,
    pub splits: MoveCounter,
    pub merges: MoveCounter,
}

/// The MCMC state of a Dirichlet process mixture of noisy binary vectors.
///
/// Cluster parameters are stored in one slot per observation so that every
/// possible cluster id has a home. Slots of inactive ids hold stale values
/// that are overwritten when the id is reused.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct State {
    data: BinaryMatrix,
    summaries: Vec<RowSummary>,
    /// The assignment of observations to clusters
    pub asgn: Assignment,
    params: Vec<Vec<f64>>,
    process: Dirichlet,
    likelihood: BinaryLikelihood,
    scales: ProposalScales,
    acceptance: Acceptance,
}

impl State {
    /// Create a new state, drawing the concentration from its prior and the
    /// initial cluster parameters from their Beta posteriors.
    pub fn new<R: Rng>(
        data: BinaryMatrix,
        config: &StateConfig,
        rng: &mut R,
    ) -> Result<Self, NewStateError> {
        let n = data.n_rows();
        let likelihood = BinaryLikelihood::new(
            config.fp_rate,
            config.fn_rate,
            config.beta_a,
            config.beta_b,
        )?;
        let process = Dirichlet::from_prior(
            config.concentration.prior_shape(n),
            config.concentration_rate,
            n,
            rng,
        )?;

        let (asgn, params) = match config.init_mode {
            InitMode::Together => {
                let asgn = Assignment::together(n)?;
                let mut params = vec![vec![0.0; data.n_cols()]; n];
                let all_rows: Vec<usize> = (0..n).collect();
                let counts = FeatureCounts::from_rows(&data, &all_rows);
                params[0] = likelihood.draw_params(&counts, rng);
                (asgn, params)
            }
            InitMode::Separate => {
                let asgn = Assignment::separate(n)?;
                let params = data
                    .rows()
                    .map(|row| likelihood.draw_params_from_row(row, rng))
                    .collect();
                (asgn, params)
            }
        };

        Ok(Self {
            summaries: data.summaries(),
            data,
            asgn,
            params,
            process,
            likelihood,
            scales: ProposalScales::default(),
            acceptance: Acceptance::default(),
        })
    }

    /// Number of observations
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.data.n_rows()
    }

    /// Number of features
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.data.n_cols()
    }

    /// Number of active clusters
    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.asgn.n_cats
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.process.alpha()
    }

    pub fn data(&self) -> &BinaryMatrix {
        &self.data
    }

    pub fn likelihood(&self) -> &BinaryLikelihood {
        &self.likelihood
    }

    pub fn process(&self) -> &Dirichlet {
        &self.process
    }

    pub fn proposal_scales(&self) -> &ProposalScales {
        &self.scales
    }

    pub fn acceptance(&self) -> &Acceptance {
        &self.acceptance
    }

    /// Reset the parameter acceptance counter, e.g. after reporting it
    pub fn reset_param_acceptance(&mut self) {
        self.acceptance.params.reset();
    }

    /// Parameters of cluster `k`. Only meaningful for active ids.
    #[inline]
    pub fn params(&self, k: usize) -> &[f64] {
        &self.params[k]
    }

    /// Log likelihood of observation `row_ix` under the parameters of `k`
    #[inline]
    pub fn ln_f_row(&self, row_ix: usize, k: usize) -> f64 {
        self.ln_f_row_given(row_ix, &self.params[k])
    }

    #[inline]
    fn ln_f_row_given(&self, row_ix: usize, theta: &[f64]) -> f64 {
        self.likelihood.ln_f_row(
            self.data.row(row_ix),
            self.summaries[row_ix].n_missing,
            theta,
        )
    }

    /// Log likelihood of the data under the current partition and cluster
    /// parameters
    pub fn loglike(&self) -> f64 {
        self.asgn
            .iter()
            .enumerate()
            .map(|(row_ix, &k)| self.ln_f_row(row_ix, k))
            .sum()
    }

    /// Log prior of the concentration, the partition, and (unless the Beta
    /// prior is uniform) the parameters each observation is assigned to
    pub fn log_prior(&self) -> f64 {
        let ln_partition = self.process.ln_f_partition(&self.asgn);
        if self.likelihood.is_prior_uniform() {
            ln_partition
        } else {
            let ln_params: f64 = self
                .asgn
                .counts
                .iter()
                .enumerate()
                .filter(|(_, &ct)| ct > 0)
                .map(|(k, &ct)| {
                    ct as f64 * self.likelihood.ln_prior_params(&self.params[k])
                })
                .sum();
            ln_partition + ln_params
        }
    }

    pub fn log_posterior(&self) -> f64 {
        self.loglike() + self.log_prior()
    }

    /// Run each transition in order
    pub fn step<R: Rng>(
        &mut self,
        transitions: &[StateTransition],
        rng: &mut R,
    ) {
        for transition in transitions {
            match transition {
                StateTransition::RowAssignment(alg) => {
                    self.reassign_rows(*alg, rng);
                }
                StateTransition::ComponentParams => {
                    self.update_component_params(rng);
                }
                StateTransition::Concentration => {
                    self.update_alpha(rng);
                }
            }
        }
    }

    pub fn reassign_rows<R: Rng>(&mut self, alg: RowAssignAlg, rng: &mut R) {
        match alg {
            RowAssignAlg::Gibbs => {
                self.reassign_rows_gibbs(rng);
                self.adapt_proposal_scales();
            }
            RowAssignAlg::SplitMerge {
                split_prob,
                n_scans,
            } => {
                self.split_merge(split_prob, n_scans, rng);
            }
        }
    }

    /// Escobar-West update of the concentration
    pub fn update_alpha<R: Rng>(&mut self, rng: &mut R) {
        self.process.update_params(&self.asgn, rng);
    }

    /// Tune the parameter proposal scales from the acceptance since the last
    /// adaptation
    pub fn adapt_proposal_scales(&mut self) {
        let (adaptation, ratio) = self.scales.adapt();
        if adaptation != ScaleAdaptation::Unchanged {
            let s = self.scales.scales();
            debug!(
                "MH acceptance parameters: {:.2} (scales: {:.2}|{:.2}|{:.2})",
                ratio, s[0], s[1], s[2]
            );
        }
    }

    /// Feature counts of every cluster slot
    fn cluster_counts(&self) -> Vec<FeatureCounts> {
        let mut counts = vec![FeatureCounts::new(self.n_cols()); self.n_rows()];
        self.asgn.iter().enumerate().for_each(|(row_ix, &k)| {
            counts[k].observe(self.data.row(row_ix));
        });
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn small_data() -> BinaryMatrix {
        BinaryMatrix::new(vec![
            vec![Some(true), Some(false), None],
            vec![Some(true), Some(true), Some(false)],
            vec![None, Some(false), Some(false)],
            vec![Some(false), Some(false), Some(true)],
        ])
        .unwrap()
    }

    #[test]
    fn together_init_has_one_cluster() {
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let state =
            State::new(small_data(), &StateConfig::default(), &mut rng)
                .unwrap();
        assert_eq!(state.n_clusters(), 1);
        assert_eq!(state.asgn.counts[0], 4);
        assert!(state.params(0).iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(state.alpha() >= 1.0);
    }

    #[test]
    fn separate_init_has_n_clusters() {
        let mut rng = Xoshiro256Plus::seed_from_u64(2);
        let config = StateConfig::default().init_mode(InitMode::Separate);
        let state = State::new(small_data(), &config, &mut rng).unwrap();
        assert_eq!(state.n_clusters(), 4);
        assert!(state.asgn.validate().is_valid());
    }

    #[test]
    fn single_row_builds_with_auto_concentration() {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let data =
            BinaryMatrix::new(vec![vec![Some(true), None, Some(false)]])
                .unwrap();
        for init_mode in [InitMode::Together, InitMode::Separate] {
            let config = StateConfig::default().init_mode(init_mode);
            let state = State::new(data.clone(), &config, &mut rng).unwrap();
            assert_eq!(state.n_clusters(), 1);
            assert!(state.alpha().is_finite() && state.alpha() > 0.0);
        }
    }

    #[test]
    fn invalid_error_rate_is_an_error() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let config = StateConfig::default().error_rates(1.2, 0.1);
        let res = State::new(small_data(), &config, &mut rng);
        assert!(matches!(res, Err(NewStateError::Likelihood(_))));
    }

    #[test]
    fn loglike_sums_rows() {
        let mut rng = Xoshiro256Plus::seed_from_u64(4);
        let state =
            State::new(small_data(), &StateConfig::default(), &mut rng)
                .unwrap();
        let by_rows: f64 = (0..4).map(|ix| state.ln_f_row(ix, 0)).sum();
        assert_relative_eq!(state.loglike(), by_rows, epsilon = 1E-12);
        assert_relative_eq!(
            state.log_posterior(),
            state.loglike() + state.log_prior(),
            epsilon = 1E-12
        );
    }

    #[test]
    fn non_uniform_prior_weights_params_by_count() {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let config = StateConfig::default().beta_prior(2.0, 2.0);
        let state = State::new(small_data(), &config, &mut rng).unwrap();
        let expected = state.process().ln_f_partition(&state.asgn)
            + 4.0 * state.likelihood().ln_prior_params(state.params(0));
        assert_relative_eq!(state.log_prior(), expected, epsilon = 1E-12);
    }

    #[test]
    fn move_counter_ratio() {
        let mut counter = MoveCounter::default();
        assert_eq!(counter.ratio(), None);
        counter.record(true);
        counter.add(1, 3);
        assert_eq!(counter.total(), 4);
        assert_relative_eq!(counter.ratio().unwrap(), 0.5);
        counter.reset();
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn cluster_counts_follow_assignment() {
        let mut rng = Xoshiro256Plus::seed_from_u64(6);
        let state =
            State::new(small_data(), &StateConfig::default(), &mut rng)
                .unwrap();
        let counts = state.cluster_counts();
        assert_eq!(counts[0].ones, vec![2, 1, 1]);
        assert_eq!(counts[0].zeros, vec![1, 3, 2]);
        assert!(counts[1].ones.iter().all(|&x| x == 0));
    }
}
