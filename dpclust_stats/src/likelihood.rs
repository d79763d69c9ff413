//! Noisy Bernoulli observation model with a Beta prior on cluster parameters
//!
//! An observed value `v` of a feature whose true state is `1` with
//! probability `theta` has likelihood
//!
//! `theta * FN(v) + (1 - theta) * FP(v)`
//!
//! where `FN(v) = (1 - fn)^v fn^(1-v)` and `FP(v) = (1 - fp)^(1-v) fp^v`.
//! Missing values contribute a constant derived from the Beta prior.
use rand::Rng;
use serde::{Deserialize, Serialize};
use special::Gamma as _;
use thiserror::Error;

use crate::ln_prob::ln_clamped;
use crate::rv::dist::Beta;
use crate::rv::traits::Rv;
use dpclust_data::BinaryMatrix;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ErrorModelError {
    #[error("the false-positive rate must be in [0, 1); got {0}")]
    InvalidFalsePositiveRate(f64),
    #[error("the false-negative rate must be in [0, 1); got {0}")]
    InvalidFalseNegativeRate(f64),
    #[error("Beta prior shapes must be positive and finite; got ({0}, {1})")]
    InvalidBetaPrior(f64, f64),
}

fn ln_beta_fn(a: f64, b: f64) -> f64 {
    a.ln_gamma().0 + b.ln_gamma().0 - (a + b).ln_gamma().0
}

/// Number of ones and zeros per feature among a set of observations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCounts {
    pub ones: Vec<u32>,
    pub zeros: Vec<u32>,
}

impl FeatureCounts {
    pub fn new(n_cols: usize) -> Self {
        Self {
            ones: vec![0; n_cols],
            zeros: vec![0; n_cols],
        }
    }

    /// Tally the rows `row_ixs` of `data`
    pub fn from_rows<'a, I>(data: &BinaryMatrix, row_ixs: I) -> Self
    where
        I: IntoIterator<Item = &'a usize>,
    {
        let mut counts = Self::new(data.n_cols());
        row_ixs
            .into_iter()
            .for_each(|&ix| counts.observe(data.row(ix)));
        counts
    }

    pub fn observe(&mut self, row: &[Option<bool>]) {
        row.iter().enumerate().for_each(|(f, x)| match x {
            Some(true) => self.ones[f] += 1,
            Some(false) => self.zeros[f] += 1,
            None => (),
        })
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.ones.len()
    }
}

/// Observation model shared by every cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinaryLikelihood {
    fp_rate: f64,
    fn_rate: f64,
    prior_a: f64,
    prior_b: f64,
    /// `B(a, b + 1)`
    bmc0: f64,
    /// `B(a + 1, b)`
    bmc1: f64,
    ln_missing: f64,
    ln_beta_ab: f64,
}

impl BinaryLikelihood {
    pub fn new(
        fp_rate: f64,
        fn_rate: f64,
        prior_a: f64,
        prior_b: f64,
    ) -> Result<Self, ErrorModelError> {
        if !(0.0..1.0).contains(&fp_rate) {
            return Err(ErrorModelError::InvalidFalsePositiveRate(fp_rate));
        } else if !(0.0..1.0).contains(&fn_rate) {
            return Err(ErrorModelError::InvalidFalseNegativeRate(fn_rate));
        } else if !(prior_a.is_finite()
            && prior_b.is_finite()
            && prior_a > 0.0
            && prior_b > 0.0)
        {
            return Err(ErrorModelError::InvalidBetaPrior(prior_a, prior_b));
        }

        let bmc0 = ln_beta_fn(prior_a, prior_b + 1.0).exp();
        let bmc1 = ln_beta_fn(prior_a + 1.0, prior_b).exp();

        Ok(Self {
            fp_rate,
            fn_rate,
            prior_a,
            prior_b,
            bmc0,
            bmc1,
            ln_missing: ((bmc0 + bmc1) / 2.0).ln(),
            ln_beta_ab: ln_beta_fn(prior_a, prior_b),
        })
    }

    #[inline]
    pub fn fp_rate(&self) -> f64 {
        self.fp_rate
    }

    #[inline]
    pub fn fn_rate(&self) -> f64 {
        self.fn_rate
    }

    /// Beta prior shapes `(a, b)`
    pub fn prior_shapes(&self) -> (f64, f64) {
        (self.prior_a, self.prior_b)
    }

    /// The Beta prior is uniform when both shapes are 1, in which case its
    /// density is left out of every MH ratio.
    #[inline]
    pub fn is_prior_uniform(&self) -> bool {
        self.prior_a == 1.0 && self.prior_b == 1.0
    }

    /// Log contribution of one missing value
    #[inline]
    pub fn ln_missing(&self) -> f64 {
        self.ln_missing
    }

    #[inline]
    fn fn_branch(&self, v: bool) -> f64 {
        if v {
            1.0 - self.fn_rate
        } else {
            self.fn_rate
        }
    }

    #[inline]
    fn fp_branch(&self, v: bool) -> f64 {
        if v {
            self.fp_rate
        } else {
            1.0 - self.fp_rate
        }
    }

    /// Probability of observing `v` under parameter `theta`
    #[inline]
    pub fn f_obs(&self, v: bool, theta: f64) -> f64 {
        theta * self.fn_branch(v) + (1.0 - theta) * self.fp_branch(v)
    }

    /// Log likelihood of one observation vector under `theta`
    pub fn ln_f_row(
        &self,
        row: &[Option<bool>],
        n_missing: usize,
        theta: &[f64],
    ) -> f64 {
        let ln_f_present: f64 = row
            .iter()
            .zip(theta.iter())
            .filter_map(|(x, &p)| x.map(|v| ln_clamped(self.f_obs(v, p))))
            .sum();
        ln_f_present + n_missing as f64 * self.ln_missing
    }

    /// Log marginal of one observation vector in a brand new cluster
    pub fn ln_f_singleton(&self, row: &[Option<bool>], n_missing: usize) -> f64 {
        let ln_f_present: f64 = row
            .iter()
            .filter_map(|x| {
                x.map(|v| {
                    ln_clamped(
                        self.bmc0 * self.fp_branch(v)
                            + self.bmc1 * self.fn_branch(v),
                    )
                })
            })
            .sum();
        ln_f_present + n_missing as f64 * self.ln_missing
    }

    /// Log likelihood of `row` using the observed values of `reference` as
    /// parameters. Features missing in either row are skipped.
    pub fn ln_f_row_given_row(
        &self,
        row: &[Option<bool>],
        reference: &[Option<bool>],
    ) -> f64 {
        row.iter()
            .zip(reference.iter())
            .filter_map(|(x, r)| match (x, r) {
                (Some(v), Some(r)) => {
                    let theta = if *r { 1.0 } else { 0.0 };
                    Some(ln_clamped(self.f_obs(*v, theta)))
                }
                _ => None,
            })
            .sum()
    }

    /// Log likelihood of `ones` ones and `zeros` zeros of one feature under
    /// parameter `theta`
    #[inline]
    pub fn ln_f_counts(&self, ones: u32, zeros: u32, theta: f64) -> f64 {
        let mut ln_f = 0.0;
        if ones > 0 {
            ln_f += f64::from(ones) * ln_clamped(self.f_obs(true, theta));
        }
        if zeros > 0 {
            ln_f += f64::from(zeros) * ln_clamped(self.f_obs(false, theta));
        }
        ln_f
    }

    /// Log Beta prior density of a single parameter
    #[inline]
    pub fn ln_prior_param(&self, theta: f64) -> f64 {
        (self.prior_a - 1.0) * ln_clamped(theta)
            + (self.prior_b - 1.0) * ln_clamped(1.0 - theta)
            - self.ln_beta_ab
    }

    /// Log Beta prior density of a parameter vector
    pub fn ln_prior_params(&self, theta: &[f64]) -> f64 {
        theta.iter().map(|&p| self.ln_prior_param(p)).sum()
    }

    /// Log posterior target of a single feature of a cluster: likelihood of
    /// the feature's counts plus the prior density when it is not uniform.
    #[inline]
    pub fn ln_param_target(&self, ones: u32, zeros: u32, theta: f64) -> f64 {
        let ln_f = self.ln_f_counts(ones, zeros, theta);
        if self.is_prior_uniform() {
            ln_f
        } else {
            ln_f + self.ln_prior_param(theta)
        }
    }

    /// Draw parameters from the Beta posterior given feature counts
    pub fn draw_params<R: Rng>(
        &self,
        counts: &FeatureCounts,
        rng: &mut R,
    ) -> Vec<f64> {
        counts
            .ones
            .iter()
            .zip(counts.zeros.iter())
            .map(|(&ones, &zeros)| {
                let beta = Beta::new_unchecked(
                    self.prior_a + f64::from(ones),
                    self.prior_b + f64::from(zeros),
                );
                Rv::<f64>::draw(&beta, rng)
            })
            .collect()
    }

    /// Draw parameters from the Beta posterior of a single observation
    pub fn draw_params_from_row<R: Rng>(
        &self,
        row: &[Option<bool>],
        rng: &mut R,
    ) -> Vec<f64> {
        let mut counts = FeatureCounts::new(row.len());
        counts.observe(row);
        self.draw_params(&counts, rng)
    }
}
