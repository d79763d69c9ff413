//! Dirichlet process prior on partitions and its concentration parameter
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assignment::Assignment;
use crate::rv::dist::{Beta, Gamma};
use crate::rv::traits::Rv;
use dpclust_consts::EPSILON;

pub trait PriorProcessT {
    /// Log weight of joining a cluster that holds `n_k` other observations
    fn ln_gibbs_weight(&self, n_k: usize) -> f64;

    /// Log weight of opening a new cluster
    fn ln_singleton_weight(&self) -> f64;

    /// Update the process parameters given the partition
    fn update_params<R: Rng>(&mut self, asgn: &Assignment, rng: &mut R);

    /// Log prior of the partition and the process parameters
    fn ln_f_partition(&self, asgn: &Assignment) -> f64;
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildProcessError {
    #[error("the concentration prior shape must be positive and finite; got {0}")]
    InvalidPriorShape(f64),
    #[error("the concentration prior rate must be positive and finite; got {0}")]
    InvalidPriorRate(f64),
    #[error("the concentration must be positive and finite; got {0}")]
    InvalidAlpha(f64),
    #[error("the process needs at least one observation")]
    NoData,
}

/// Chinese restaurant process with a Gamma(shape, rate) prior on the
/// concentration, `alpha`.
///
/// The log CRP weights for every cluster size `1..=n` and for a new cluster
/// are cached in a table that must be rebuilt whenever `alpha` changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Dirichlet {
    alpha: f64,
    alpha_prior: Gamma,
    prior_shape: f64,
    prior_rate: f64,
    n: usize,
    ln_crp: Vec<f64>,
}

impl Dirichlet {
    pub fn new(
        alpha: f64,
        prior_shape: f64,
        prior_rate: f64,
        n: usize,
    ) -> Result<Self, BuildProcessError> {
        if n == 0 {
            return Err(BuildProcessError::NoData);
        } else if !(alpha.is_finite() && alpha > 0.0) {
            return Err(BuildProcessError::InvalidAlpha(alpha));
        }

        let alpha_prior = Gamma::new(prior_shape, prior_rate).map_err(|_| {
            if !(prior_shape.is_finite() && prior_shape > 0.0) {
                BuildProcessError::InvalidPriorShape(prior_shape)
            } else {
                BuildProcessError::InvalidPriorRate(prior_rate)
            }
        })?;

        let mut process = Self {
            alpha,
            alpha_prior,
            prior_shape,
            prior_rate,
            n,
            ln_crp: Vec::new(),
        };
        process.rebuild_table();
        Ok(process)
    }

    /// Draw `alpha` from its prior. The draw is floored at `1 + EPSILON`.
    pub fn from_prior<R: Rng>(
        prior_shape: f64,
        prior_rate: f64,
        n: usize,
        rng: &mut R,
    ) -> Result<Self, BuildProcessError> {
        let mut process = Self::new(1.0, prior_shape, prior_rate, n)?;
        let alpha: f64 = process.alpha_prior.draw(rng);
        process.set_alpha(alpha);
        Ok(process)
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_prior(&self) -> &Gamma {
        &self.alpha_prior
    }

    /// Number of observations the table was built for
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Set the concentration and rebuild the weight table
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.max(1.0 + EPSILON);
        self.rebuild_table();
    }

    /// Recompute the cached log CRP weights.
    ///
    /// Entry `k` in `1..=n` is `ln(k) - ln(n - 1 + alpha)`; entry `n + 1` is
    /// the weight of a new cluster, `ln(alpha) - ln(n - 1 + alpha)`.
    pub fn rebuild_table(&mut self) {
        let ln_z = (self.n as f64 - 1.0 + self.alpha).ln();
        let mut table = Vec::with_capacity(self.n + 2);
        table.push(0.0);
        table.extend((1..=self.n).map(|k| (k as f64).ln() - ln_z));
        table.push(self.alpha.ln() - ln_z);
        self.ln_crp = table;
    }

    /// CRP weight of a cluster of `n_k` observations in a population of
    /// `n_total`. Used by restricted scans, which work on a sub-population.
    pub fn ln_crp_weight(&self, n_k: f64, n_total: usize) -> f64 {
        n_k.ln() - (n_total as f64 - 1.0 + self.alpha).ln()
    }

    /// Escobar & West (1995) auxiliary variable update of `alpha` given `k`
    /// active clusters.
    pub fn update_alpha<R: Rng>(&mut self, k: usize, rng: &mut R) {
        let n = self.n as f64;
        let k = k as f64;
        let a = self.prior_shape;
        let b = self.prior_rate;

        // Eq. 14
        let eta: f64 = Beta::new_unchecked(self.alpha + 1.0, n).draw(rng);
        let rate = b - eta.max(EPSILON).ln();
        let w = (a + k - 1.0) / (n * rate);
        let pi_eta = w / (1.0 + w);

        // Eq. 13
        let shape = if rng.gen::<f64>() < pi_eta {
            a + k
        } else {
            a + k - 1.0
        };
        let alpha: f64 = Gamma::new_unchecked(shape, rate).draw(rng);

        self.set_alpha(alpha);
    }

    /// Log density of `alpha` under its prior
    pub fn ln_prior_alpha(&self) -> f64 {
        self.alpha_prior.ln_f(&self.alpha)
    }
}

impl PriorProcessT for Dirichlet {
    fn ln_gibbs_weight(&self, n_k: usize) -> f64 {
        self.ln_crp[n_k]
    }

    fn ln_singleton_weight(&self) -> f64 {
        self.ln_crp[self.n + 1]
    }

    fn update_params<R: Rng>(&mut self, asgn: &Assignment, rng: &mut R) {
        self.update_alpha(asgn.n_cats, rng)
    }

    fn ln_f_partition(&self, asgn: &Assignment) -> f64 {
        let ln_crp: f64 = asgn
            .counts
            .iter()
            .filter(|&&ct| ct > 0)
            .map(|&ct| self.ln_crp[ct])
            .sum();
        self.ln_prior_alpha() + ln_crp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn table_matches_crp_formula() {
        let process = Dirichlet::new(2.0, 1.0, 1.0, 10).unwrap();
        assert_relative_eq!(
            process.ln_gibbs_weight(3),
            3.0_f64.ln() - 11.0_f64.ln(),
            epsilon = 1E-12
        );
        assert_relative_eq!(
            process.ln_singleton_weight(),
            2.0_f64.ln() - 11.0_f64.ln(),
            epsilon = 1E-12
        );
    }

    #[test]
    fn crp_weight_strictly_increases_with_size() {
        let process = Dirichlet::new(1.7, 1.0, 1.0, 50).unwrap();
        for k in 1..50 {
            assert!(process.ln_gibbs_weight(k) < process.ln_gibbs_weight(k + 1));
        }
    }

    #[test]
    fn sub_population_weight_agrees_with_table() {
        let process = Dirichlet::new(3.0, 1.0, 1.0, 20).unwrap();
        assert_relative_eq!(
            process.ln_crp_weight(7.0, 20),
            process.ln_gibbs_weight(7),
            epsilon = 1E-12
        );
    }

    #[test]
    fn alpha_never_falls_below_floor() {
        let mut rng = Xoshiro256Plus::seed_from_u64(1337);
        let mut process = Dirichlet::new(1.5, 10_f64.ln(), 1.0, 10).unwrap();
        for _ in 0..10_000 {
            process.update_alpha(1, &mut rng);
            assert!(process.alpha() >= 1.0 + EPSILON);
        }
    }

    #[test]
    fn set_alpha_rebuilds_table() {
        let mut process = Dirichlet::new(2.0, 1.0, 1.0, 5).unwrap();
        let before = process.ln_singleton_weight();
        process.set_alpha(4.0);
        assert!(process.ln_singleton_weight() > before);
        assert_relative_eq!(
            process.ln_singleton_weight(),
            4.0_f64.ln() - 8.0_f64.ln(),
            epsilon = 1E-12
        );
    }

    #[test]
    fn from_prior_respects_floor() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        for _ in 0..100 {
            let process = Dirichlet::from_prior(0.1, 1.0, 4, &mut rng).unwrap();
            assert!(process.alpha() >= 1.0 + EPSILON);
        }
    }

    #[test]
    fn invalid_prior_is_an_error() {
        assert_eq!(
            Dirichlet::new(1.0, -1.0, 1.0, 3),
            Err(BuildProcessError::InvalidPriorShape(-1.0))
        );
        assert_eq!(
            Dirichlet::new(1.0, 1.0, 0.0, 3),
            Err(BuildProcessError::InvalidPriorRate(0.0))
        );
        assert_eq!(
            Dirichlet::new(1.0, 1.0, 1.0, 0),
            Err(BuildProcessError::NoData)
        );
    }

    #[test]
    fn partition_prior_sums_cluster_weights() {
        let process = Dirichlet::new(2.0, 1.0, 1.0, 4).unwrap();
        let asgn = Assignment::from_vec(vec![0, 0, 0, 2]).unwrap();
        let expected = process.ln_prior_alpha()
            + process.ln_gibbs_weight(3)
            + process.ln_gibbs_weight(1);
        assert_relative_eq!(
            process.ln_f_partition(&asgn),
            expected,
            epsilon = 1E-12
        );
    }
}
