use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

use super::State;
use dpclust_stats::likelihood::{BinaryLikelihood, FeatureCounts};
use dpclust_stats::mh::{mh_truncated_walk, FeatureWalk, ProposalScales};

/// One Metropolis-Hastings pass over the parameters of a cluster whose
/// members have feature counts `counts`.
pub fn walk_cluster_params<R: Rng>(
    likelihood: &BinaryLikelihood,
    scales: &ProposalScales,
    theta: &[f64],
    counts: &FeatureCounts,
    rng: &mut R,
) -> FeatureWalk {
    mh_truncated_walk(
        theta,
        |f, p| likelihood.ln_param_target(counts.ones[f], counts.zeros[f], p),
        scales,
        rng,
    )
}

impl State {
    /// Update the parameters of every active cluster. Clusters are
    /// independent given the assignment, so they are updated in parallel,
    /// each with its own generator seeded from `rng`.
    pub fn update_component_params<R: Rng>(&mut self, rng: &mut R) {
        let active = self.asgn.active_ids();
        let counts = self.cluster_counts();

        let mut rngs: Vec<Xoshiro256Plus> = (0..active.len())
            .map(|_| Xoshiro256Plus::seed_from_u64(rng.gen()))
            .collect();

        let walks: Vec<FeatureWalk> = {
            let likelihood = &self.likelihood;
            let scales = &self.scales;
            let params = &self.params;
            active
                .par_iter()
                .zip_eq(rngs.par_iter_mut())
                .map(|(&k, t_rng)| {
                    walk_cluster_params(
                        likelihood, scales, &params[k], &counts[k], t_rng,
                    )
                })
                .collect()
        };

        let n_cols = self.n_cols();
        for (k, walk) in active.into_iter().zip(walks) {
            self.scales.record(walk.n_accepted, n_cols);
            self.acceptance.params.add(walk.n_accepted, n_cols);
            self.params[k] = walk.x;
        }
    }
}
