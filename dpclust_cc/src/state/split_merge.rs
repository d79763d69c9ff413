use rand::seq::SliceRandom;
use rand::Rng;
use special::Gamma as _;

use super::params::walk_cluster_params;
use super::State;
use dpclust_stats::likelihood::FeatureCounts;
use dpclust_stats::mh::ln_clipped_acceptance;
use dpclust_stats::normalize_ln_pair;
use dpclust_utils::{choose2ixs, pflip, pflip_excluding};

#[inline]
fn ln_gamma(x: usize) -> f64 {
    (x as f64).ln_gamma().0
}

/// Scratch state of a split or merge proposal. Nothing in here is part of
/// the chain until a proposal is accepted.
#[derive(Clone, Debug)]
struct LaunchState {
    i: usize,
    j: usize,
    /// Rows other than `i` and `j` whose side is being sampled
    s: Vec<usize>,
    /// `with_j[ix]` is `true` if `s[ix]` is with `j`
    with_j: Vec<bool>,
    params_i: Vec<f64>,
    params_j: Vec<f64>,
    params_merged: Vec<f64>,
    n_accepted: usize,
    n_proposed: usize,
}

impl LaunchState {
    fn n_with_j(&self) -> usize {
        self.with_j.iter().filter(|&&b| b).count()
    }

    /// Sizes of the `i` and `j` sides, counting `i` and `j`
    fn side_sizes(&self) -> (usize, usize) {
        let n_with_j = self.n_with_j();
        (self.s.len() - n_with_j + 1, n_with_j + 1)
    }

    fn side_rows(&self, j_side: bool) -> Vec<usize> {
        let anchor = if j_side { self.j } else { self.i };
        let mut rows: Vec<usize> = self
            .s
            .iter()
            .zip(self.with_j.iter())
            .filter_map(|(&ix, &wj)| if wj == j_side { Some(ix) } else { None })
            .collect();
        rows.push(anchor);
        rows
    }

    fn all_rows(&self) -> Vec<usize> {
        let mut rows = Vec::with_capacity(self.s.len() + 2);
        rows.push(self.i);
        rows.extend_from_slice(&self.s);
        rows.push(self.j);
        rows
    }
}

impl State {
    fn ln_f_rows(&self, rows: &[usize], theta: &[f64]) -> f64 {
        rows.iter()
            .map(|&row_ix| self.ln_f_row_given(row_ix, theta))
            .sum()
    }

    fn side_counts(&self, launch: &LaunchState) -> (FeatureCounts, FeatureCounts) {
        (
            FeatureCounts::from_rows(&self.data, &launch.side_rows(false)),
            FeatureCounts::from_rows(&self.data, &launch.side_rows(true)),
        )
    }

    /// Log likelihood of each row of `s` under `theta_i` and `theta_j`
    fn restricted_lls(
        &self,
        s: &[usize],
        theta_i: &[f64],
        theta_j: &[f64],
    ) -> Vec<[f64; 2]> {
        s.iter()
            .map(|&row_ix| {
                [
                    self.ln_f_row_given(row_ix, theta_i),
                    self.ln_f_row_given(row_ix, theta_j),
                ]
            })
            .collect()
    }

    /// Normalized log probabilities of putting a row on the `i` or `j` side
    /// given how many of the other rows are with `j`
    fn ln_side_probs(
        &self,
        ll: [f64; 2],
        n_others_with_j: usize,
        n_s: usize,
    ) -> [f64; 2] {
        let n_total = n_s + 2;
        let n_j = n_others_with_j + 1;
        let n_i = n_s - n_others_with_j;
        normalize_ln_pair(
            ll[0] + self.process.ln_crp_weight(n_i as f64, n_total),
            ll[1] + self.process.ln_crp_weight(n_j as f64, n_total),
        )
    }

    /// MH update of both side parameters. Returns the log transition
    /// probability.
    fn restricted_param_scan<R: Rng>(
        &self,
        launch: &mut LaunchState,
        rng: &mut R,
    ) -> f64 {
        let (counts_i, counts_j) = self.side_counts(launch);
        let walk_i = walk_cluster_params(
            &self.likelihood,
            &self.scales,
            &launch.params_i,
            &counts_i,
            rng,
        );
        let walk_j = walk_cluster_params(
            &self.likelihood,
            &self.scales,
            &launch.params_j,
            &counts_j,
            rng,
        );

        launch.n_accepted += walk_i.n_accepted + walk_j.n_accepted;
        launch.n_proposed += 2 * self.n_cols();
        launch.params_i = walk_i.x;
        launch.params_j = walk_j.x;

        walk_i.ln_trans + walk_j.ln_trans
    }

    /// Sequentially resample the side of every row of `s` in random order.
    /// Returns the log transition probability.
    fn restricted_assign_scan<R: Rng>(
        &self,
        launch: &mut LaunchState,
        rng: &mut R,
    ) -> f64 {
        let n_s = launch.s.len();
        let lls = self.restricted_lls(&launch.s, &launch.params_i, &launch.params_j);
        let mut n_with_j = launch.n_with_j();

        let mut order: Vec<usize> = (0..n_s).collect();
        order.shuffle(rng);

        order.into_iter().fold(0.0, |ln_trans, ix| {
            if launch.with_j[ix] {
                n_with_j -= 1;
            }
            let ln_ps = self.ln_side_probs(lls[ix], n_with_j, n_s);
            let to_j = rng.gen::<f64>() >= ln_ps[0].exp();
            launch.with_j[ix] = to_j;
            if to_j {
                n_with_j += 1;
                ln_trans + ln_ps[1]
            } else {
                ln_trans + ln_ps[0]
            }
        })
    }

    fn restricted_split_scan<R: Rng>(
        &self,
        launch: &mut LaunchState,
        rng: &mut R,
    ) -> f64 {
        self.restricted_param_scan(launch, rng)
            + self.restricted_assign_scan(launch, rng)
    }

    fn merged_param_scan<R: Rng>(
        &self,
        launch: &mut LaunchState,
        counts: &FeatureCounts,
        rng: &mut R,
    ) -> f64 {
        let walk = walk_cluster_params(
            &self.likelihood,
            &self.scales,
            &launch.params_merged,
            counts,
            rng,
        );
        launch.n_accepted += walk.n_accepted;
        launch.n_proposed += self.n_cols();
        launch.params_merged = walk.x;
        walk.ln_trans
    }

    /// Build the split and merge launch states for anchors `i` and `j`.
    ///
    /// Rows of `s` start on the side of the anchor whose observed values
    /// explain them best (ties go to `i`), then `n_scans` restricted scans
    /// are run on the split and on the merged parameters.
    fn build_launch<R: Rng>(
        &self,
        i: usize,
        j: usize,
        s: Vec<usize>,
        n_scans: usize,
        rng: &mut R,
    ) -> LaunchState {
        let row_i = self.data.row(i);
        let row_j = self.data.row(j);
        let with_j = s
            .iter()
            .map(|&ix| {
                let row = self.data.row(ix);
                self.likelihood.ln_f_row_given_row(row, row_j)
                    > self.likelihood.ln_f_row_given_row(row, row_i)
            })
            .collect();

        let mut launch = LaunchState {
            i,
            j,
            s,
            with_j,
            params_i: Vec::new(),
            params_j: Vec::new(),
            params_merged: Vec::new(),
            n_accepted: 0,
            n_proposed: 0,
        };

        let (counts_i, counts_j) = self.side_counts(&launch);
        launch.params_i = self.likelihood.draw_params(&counts_i, rng);
        launch.params_j = self.likelihood.draw_params(&counts_j, rng);
        for _ in 0..n_scans {
            self.restricted_split_scan(&mut launch, rng);
        }

        let counts_all = FeatureCounts::from_rows(&self.data, &launch.all_rows());
        launch.params_merged = self.likelihood.draw_params(&counts_all, rng);
        for _ in 0..n_scans {
            self.merged_param_scan(&mut launch, &counts_all, rng);
        }

        launch
    }

    /// Log probability that one restricted split scan from the launch state
    /// ends at the split given by `target` and the parameters of clusters
    /// `k_i` and `k_j`. The launch assignment ends up equal to `target`.
    fn replay_split<R: Rng>(
        &self,
        launch: &mut LaunchState,
        target: &[bool],
        k_i: usize,
        k_j: usize,
        rng: &mut R,
    ) -> f64 {
        let (counts_i, counts_j) = self.side_counts(launch);
        let lik = &self.likelihood;
        let ln_p_params = ln_clipped_acceptance(
            &launch.params_i,
            &self.params[k_i],
            |f, p| lik.ln_param_target(counts_i.ones[f], counts_i.zeros[f], p),
            &self.scales,
            rng,
        ) + ln_clipped_acceptance(
            &launch.params_j,
            &self.params[k_j],
            |f, p| lik.ln_param_target(counts_j.ones[f], counts_j.zeros[f], p),
            &self.scales,
            rng,
        );

        let n_s = launch.s.len();
        let lls =
            self.restricted_lls(&launch.s, &self.params[k_i], &self.params[k_j]);
        let mut n_with_j = launch.n_with_j();
        let mut ln_p_asgn = 0.0;
        for ix in 0..n_s {
            if launch.with_j[ix] {
                n_with_j -= 1;
            }
            let ln_ps = self.ln_side_probs(lls[ix], n_with_j, n_s);
            launch.with_j[ix] = target[ix];
            if target[ix] {
                n_with_j += 1;
                ln_p_asgn += ln_ps[1];
            } else {
                ln_p_asgn += ln_ps[0];
            }
        }

        ln_p_params + ln_p_asgn
    }

    fn record_launch(&mut self, launch: &LaunchState) {
        self.scales.record(launch.n_accepted, launch.n_proposed);
        self.acceptance
            .params
            .add(launch.n_accepted, launch.n_proposed);
    }

    /// Propose splitting a cluster chosen with probability proportional to
    /// its size. Returns `true` if the split was accepted.
    fn propose_split<R: Rng>(&mut self, n_scans: usize, rng: &mut R) -> bool {
        let n = self.n_rows();
        let weights: Vec<f64> =
            self.asgn.counts.iter().map(|&ct| ct as f64).collect();
        let k = loop {
            let k = pflip(&weights, rng);
            if self.asgn.counts[k] > 1 {
                break k;
            }
        };

        let members = self.asgn.members(k);
        let n_k = members.len();
        let (a, b) = choose2ixs(n_k, rng);
        let (i, j) = (members[a], members[b]);
        let s: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&ix| ix != i && ix != j)
            .collect();

        // choosing the cluster, then the ordered pair of anchors
        let ln_q_choose = (n_k as f64 / n as f64).ln()
            - (n_k as f64).ln()
            - (n_k as f64 - 1.0).ln();

        let mut launch = self.build_launch(i, j, s, n_scans, rng);
        let ln_q_fwd = self.restricted_split_scan(&mut launch, rng);

        let counts_all = FeatureCounts::from_rows(&self.data, &members);
        let lik = &self.likelihood;
        let ln_q_rev = ln_clipped_acceptance(
            &launch.params_merged,
            &self.params[k],
            |f, p| {
                lik.ln_param_target(counts_all.ones[f], counts_all.zeros[f], p)
            },
            &self.scales,
            rng,
        );

        let (n_i, n_j) = launch.side_sizes();
        let ln_prior_ratio = {
            let ln_crp = self.alpha().ln() + ln_gamma(n_i) + ln_gamma(n_j)
                - ln_gamma(n_k);
            if lik.is_prior_uniform() {
                ln_crp
            } else {
                ln_crp
                    + lik.ln_prior_params(&launch.params_i)
                    + lik.ln_prior_params(&launch.params_j)
                    - lik.ln_prior_params(&self.params[k])
            }
        };

        let rows_i = launch.side_rows(false);
        let rows_j = launch.side_rows(true);
        let ln_f_ratio = self.ln_f_rows(&rows_i, &launch.params_i)
            + self.ln_f_rows(&rows_j, &launch.params_j)
            - self.ln_f_rows(&members, &launch.params_merged);

        // choosing the two resulting clusters for a merge
        let ln_choose_ratio = {
            let norm: f64 = self
                .asgn
                .counts
                .iter()
                .enumerate()
                .filter(|&(kx, &ct)| ct > 0 && kx != k)
                .map(|(_, &ct)| 1.0 / ct as f64)
                .sum::<f64>()
                + 1.0 / n_i as f64
                + 1.0 / n_j as f64;
            let ln_q_merge = (1.0 / n_i as f64 / norm).ln()
                + (1.0 / n_j as f64 / norm).ln();
            ln_q_merge - ln_q_choose
        };

        let ln_a =
            ln_q_rev - ln_q_fwd + ln_prior_ratio + ln_f_ratio + ln_choose_ratio;

        self.record_launch(&launch);
        let accept = rng.gen::<f64>().ln() < ln_a;
        self.acceptance.splits.record(accept);

        if accept {
            let k_new = self
                .asgn
                .smallest_free_id()
                .expect("a cluster with two members leaves an id free");
            rows_j
                .iter()
                .for_each(|&row_ix| self.asgn.transfer(row_ix, k_new));
            self.params[k] = launch.params_i;
            self.params[k_new] = launch.params_j;
        }

        accept
    }

    /// Propose merging two clusters chosen with probability proportional to
    /// their inverse sizes. Returns `true` if the merge was accepted.
    fn propose_merge<R: Rng>(&mut self, n_scans: usize, rng: &mut R) -> bool {
        let n = self.n_rows();
        let active = self.asgn.active_ids();
        let inv_sizes: Vec<f64> = active
            .iter()
            .map(|&k| 1.0 / self.asgn.counts[k] as f64)
            .collect();
        let z: f64 = inv_sizes.iter().sum();

        let a = pflip(&inv_sizes, rng);
        let b = pflip_excluding(&inv_sizes, &[a], rng);
        let (k_i, k_j) = (active[a], active[b]);

        let members_i = self.asgn.members(k_i);
        let members_j = self.asgn.members(k_j);
        let (n_i, n_j) = (members_i.len(), members_j.len());

        let i = members_i[rng.gen_range(0..n_i)];
        let j = members_j[rng.gen_range(0..n_j)];

        // choosing the clusters, then one anchor from each
        let ln_q_choose = (inv_sizes[a] / z).ln() + (inv_sizes[b] / z).ln()
            - (n_i as f64).ln()
            - (n_j as f64).ln();

        let s: Vec<usize> = members_i
            .iter()
            .filter(|&&ix| ix != i)
            .chain(members_j.iter().filter(|&&ix| ix != j))
            .copied()
            .collect();
        let target: Vec<bool> = std::iter::repeat(false)
            .take(n_i - 1)
            .chain(std::iter::repeat(true).take(n_j - 1))
            .collect();
        let n_s = s.len();

        let mut launch = self.build_launch(i, j, s, n_scans, rng);
        let all_rows = launch.all_rows();
        let counts_all = FeatureCounts::from_rows(&self.data, &all_rows);
        let ln_q_fwd = self.merged_param_scan(&mut launch, &counts_all, rng);
        let ln_q_rev = self.replay_split(&mut launch, &target, k_i, k_j, rng);

        let lik = &self.likelihood;
        let ln_prior_ratio = {
            let ln_crp = ln_gamma(n_i + n_j)
                - self.alpha().ln()
                - ln_gamma(n_i)
                - ln_gamma(n_j);
            if lik.is_prior_uniform() {
                ln_crp
            } else {
                ln_crp + lik.ln_prior_params(&launch.params_merged)
                    - lik.ln_prior_params(&self.params[k_i])
                    - lik.ln_prior_params(&self.params[k_j])
            }
        };

        // the launch assignment now matches the two clusters being merged
        let ln_f_ratio = self.ln_f_rows(&all_rows, &launch.params_merged)
            - self.ln_f_rows(&launch.side_rows(false), &launch.params_i)
            - self.ln_f_rows(&launch.side_rows(true), &launch.params_j);

        // choosing the merged cluster, then the ordered pair of anchors
        let ln_choose_ratio =
            -(n as f64).ln() - ((n_s + 1) as f64).ln() - ln_q_choose;

        let ln_a =
            ln_q_rev - ln_q_fwd + ln_prior_ratio + ln_f_ratio + ln_choose_ratio;

        self.record_launch(&launch);
        let accept = rng.gen::<f64>().ln() < ln_a;
        self.acceptance.merges.record(accept);

        if accept {
            members_j
                .iter()
                .for_each(|&row_ix| self.asgn.transfer(row_ix, k_i));
            self.params[k_i] = launch.params_merged;
        }

        accept
    }

    /// Jain & Neal (2007) non-conjugate split-merge move.
    ///
    /// A split is forced when there is one cluster and a merge when every
    /// observation is alone; otherwise a split is proposed with probability
    /// `split_prob`.
    pub fn split_merge<R: Rng>(
        &mut self,
        split_prob: f64,
        n_scans: usize,
        rng: &mut R,
    ) {
        let n = self.n_rows();
        if n < 2 {
            return;
        }

        let n_cats = self.asgn.n_cats;
        let split = if n_cats == 1 {
            true
        } else if n_cats == n {
            false
        } else {
            rng.gen::<f64>() < split_prob
        };

        if split {
            self.propose_split(n_scans, rng);
        } else {
            self.propose_merge(n_scans, rng);
        }

        debug_assert!(self.asgn.validate().is_valid());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitMode, StateConfig};
    use dpclust_data::BinaryMatrix;
    use dpclust_stats::assignment::Assignment;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn identical_rows(n: usize, m: usize) -> BinaryMatrix {
        BinaryMatrix::new(vec![vec![Some(true); m]; n]).unwrap()
    }

    fn two_groups() -> BinaryMatrix {
        let mut rows = vec![vec![Some(true); 8]; 5];
        rows.extend(vec![vec![Some(false); 8]; 5]);
        BinaryMatrix::new(rows).unwrap()
    }

    #[test]
    fn launch_side_bookkeeping() {
        let launch = LaunchState {
            i: 0,
            j: 5,
            s: vec![1, 2, 3, 4],
            with_j: vec![false, true, true, false],
            params_i: vec![],
            params_j: vec![],
            params_merged: vec![],
            n_accepted: 0,
            n_proposed: 0,
        };
        assert_eq!(launch.side_sizes(), (3, 3));
        assert_eq!(launch.side_rows(false), vec![1, 4, 0]);
        assert_eq!(launch.side_rows(true), vec![2, 3, 5]);
        assert_eq!(launch.all_rows(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn launch_initialization_follows_anchor_rows() {
        let config = StateConfig::default().error_rates(0.01, 0.01);
        let mut rng = Xoshiro256Plus::seed_from_u64(10);
        let state = State::new(two_groups(), &config, &mut rng).unwrap();
        let launch =
            state.build_launch(0, 9, vec![1, 2, 3, 4, 5, 6, 7, 8], 0, &mut rng);
        assert_eq!(
            launch.with_j,
            vec![false, false, false, false, true, true, true, true]
        );
        assert_eq!(launch.params_i.len(), 8);
        assert_eq!(launch.params_merged.len(), 8);
    }

    #[test]
    fn replay_ends_at_target() {
        let config = StateConfig::default().error_rates(0.01, 0.01);
        let mut rng = Xoshiro256Plus::seed_from_u64(12);
        let mut state = State::new(two_groups(), &config, &mut rng).unwrap();
        state.asgn =
            Assignment::from_vec(vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]).unwrap();
        state.params[1] = vec![0.01; 8];

        let mut launch =
            state.build_launch(0, 9, vec![1, 2, 3, 4, 5, 6, 7, 8], 2, &mut rng);
        let target = vec![false, true, false, true, false, true, false, true];
        let ln_p = state.replay_split(&mut launch, &target, 0, 1, &mut rng);
        assert_eq!(launch.with_j, target);
        assert!(ln_p <= 0.0);
        assert!(ln_p.is_finite());
    }

    #[test]
    fn forced_split_separates_groups() {
        let config = StateConfig::default().error_rates(0.01, 0.01);
        let mut rng = Xoshiro256Plus::seed_from_u64(0xBEEF);
        let mut state = State::new(two_groups(), &config, &mut rng).unwrap();
        assert_eq!(state.n_clusters(), 1);

        for _ in 0..200 {
            state.split_merge(0.75, 5, &mut rng);
            if state.n_clusters() == 2 {
                break;
            }
        }

        assert_eq!(state.n_clusters(), 2);
        assert_eq!(state.asgn.counts.iter().sum::<usize>(), 10);
        assert!(state.asgn.validate().is_valid());
        assert!(state.acceptance().splits.accepted >= 1);
    }

    #[test]
    fn accepted_merge_of_two_clusters_leaves_one() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0xC0FFEE);
        let config = StateConfig::default().error_rates(0.01, 0.01);
        let mut state =
            State::new(identical_rows(4, 3), &config, &mut rng).unwrap();
        state.asgn = Assignment::from_vec(vec![0, 0, 0, 1]).unwrap();
        state.params[0] = vec![0.95; 3];
        state.params[1] = vec![0.95; 3];

        for _ in 0..500 {
            // two clusters among four rows, so a split_prob of 0 forces a
            // merge
            state.split_merge(0.0, 5, &mut rng);
            if state.n_clusters() == 1 {
                break;
            }
        }

        assert_eq!(state.n_clusters(), 1);
        let k = state.asgn.asgn[0];
        assert_eq!(state.asgn.counts[k], 4);
        assert_eq!(state.asgn.counts.iter().filter(|&&ct| ct > 0).count(), 1);
        assert!(state.asgn.validate().is_valid());
        assert!(state.acceptance().merges.accepted >= 1);
    }

    #[test]
    fn all_singletons_force_a_merge() {
        let mut rng = Xoshiro256Plus::seed_from_u64(4);
        let config = StateConfig::default()
            .error_rates(0.01, 0.01)
            .init_mode(InitMode::Separate);
        let mut state =
            State::new(identical_rows(3, 4), &config, &mut rng).unwrap();
        assert_eq!(state.n_clusters(), 3);

        for _ in 0..500 {
            state.split_merge(1.0, 5, &mut rng);
            if state.n_clusters() < 3 {
                break;
            }
        }

        assert_eq!(state.n_clusters(), 2);
        assert_eq!(state.acceptance().splits.total(), 0);
        assert_eq!(state.asgn.smallest_free_id().map(|k| k < 3), Some(true));
        assert!(state.asgn.validate().is_valid());
    }

    #[test]
    fn single_row_is_a_noop() {
        let mut rng = Xoshiro256Plus::seed_from_u64(4);
        let mut state = State::new(
            identical_rows(1, 2),
            &StateConfig::default(),
            &mut rng,
        )
        .unwrap();
        state.split_merge(0.5, 5, &mut rng);
        assert_eq!(state.n_clusters(), 1);
        assert_eq!(state.acceptance().splits.total(), 0);
        assert_eq!(state.acceptance().merges.total(), 0);
    }
}
