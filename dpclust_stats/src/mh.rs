use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ln_prob::ln_clamped;
use crate::rv::dist::Gaussian;
use crate::rv::traits::{Cdf, Rv};
use dpclust_consts::{
    DEFAULT_PROPOSAL_SCALES, EPSILON, PROPOSAL_ADAPT_FACTOR,
    RESEED_PROPOSAL_SCALES, TARGET_ACCEPT_LOWER, TARGET_ACCEPT_UPPER,
};

/// Normal distribution truncated to [0, 1]
#[derive(Clone, Debug)]
pub struct TruncatedUnitNormal {
    gauss: Gaussian,
    ln_z: f64,
}

impl TruncatedUnitNormal {
    /// Truncated normal with location `mu`. `sigma` is floored at `EPSILON`.
    pub fn new(mu: f64, sigma: f64) -> Self {
        let gauss = Gaussian::new_unchecked(mu, sigma.max(EPSILON));
        let mass = gauss.cdf(&1.0_f64) - gauss.cdf(&0.0_f64);
        Self {
            gauss,
            ln_z: ln_clamped(mass),
        }
    }

    /// Draw by rejection from the untruncated normal
    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        loop {
            let x: f64 = self.gauss.draw(rng);
            if (0.0..=1.0).contains(&x) {
                return x;
            }
        }
    }

    pub fn ln_f(&self, x: f64) -> f64 {
        self.gauss.ln_f(&x) - self.ln_z
    }
}

/// How the proposal scales moved in one adaptation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleAdaptation {
    Shrunk,
    Grown,
    Unchanged,
}

/// Candidate step sizes of the parameter random walk and the acceptance
/// window used to tune them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProposalScales {
    scales: [f64; 3],
    n_accepted: u64,
    n_total: u64,
}

impl Default for ProposalScales {
    fn default() -> Self {
        Self::new(DEFAULT_PROPOSAL_SCALES)
    }
}

impl ProposalScales {
    pub fn new(scales: [f64; 3]) -> Self {
        Self {
            scales,
            n_accepted: 0,
            n_total: 0,
        }
    }

    #[inline]
    pub fn scales(&self) -> [f64; 3] {
        self.scales
    }

    /// Pick one of the candidate scales uniformly
    #[inline]
    pub fn choose<R: Rng>(&self, rng: &mut R) -> f64 {
        *self.scales.choose(rng).unwrap_or(&self.scales[0])
    }

    /// Add accepted and total proposal counts to the window
    pub fn record(&mut self, n_accepted: usize, n_total: usize) {
        self.n_accepted += n_accepted as u64;
        self.n_total += n_total as u64;
    }

    /// Smoothed acceptance ratio of the current window
    pub fn acceptance_ratio(&self) -> f64 {
        (self.n_accepted as f64 + 1.0) / (self.n_total as f64 + 1.0)
    }

    /// Rescale the candidates toward the target acceptance band and reset
    /// the window.
    pub fn adapt(&mut self) -> (ScaleAdaptation, f64) {
        let ratio = self.acceptance_ratio();
        self.n_accepted = 0;
        self.n_total = 0;

        let adaptation = if ratio < TARGET_ACCEPT_LOWER {
            self.scales.iter_mut().for_each(|s| {
                *s = (*s / PROPOSAL_ADAPT_FACTOR).clamp(0.0, 1.0);
            });
            ScaleAdaptation::Shrunk
        } else if ratio > TARGET_ACCEPT_UPPER {
            self.scales.iter_mut().for_each(|s| {
                *s = (*s * PROPOSAL_ADAPT_FACTOR).clamp(0.0, 1.0);
            });
            if self.scales.iter().all(|&s| s == 1.0) {
                self.scales = RESEED_PROPOSAL_SCALES;
            }
            ScaleAdaptation::Grown
        } else {
            ScaleAdaptation::Unchanged
        };

        (adaptation, ratio)
    }
}

/// Outcome of one per-feature Metropolis-Hastings pass
#[derive(Clone, Debug)]
pub struct FeatureWalk {
    /// The parameters after the pass
    pub x: Vec<f64>,
    /// Number of features whose proposal was accepted
    pub n_accepted: usize,
    /// Log probability of the transition that was taken
    pub ln_trans: f64,
}

fn ln_acceptance<F>(
    ix: usize,
    x: f64,
    y: f64,
    sigma: f64,
    ln_target: &F,
) -> f64
where
    F: Fn(usize, f64) -> f64,
{
    let fwd = TruncatedUnitNormal::new(x, sigma);
    let rev = TruncatedUnitNormal::new(y, sigma);
    ln_target(ix, y) - ln_target(ix, x) + rev.ln_f(x) - fwd.ln_f(y)
}

/// Random walk Metropolis-Hastings over each entry of `x` independently
/// with truncated normal proposals on [0, 1].
///
/// # Arguments
/// - x: the current parameters
/// - ln_target: the unnormalized log posterior of entry `ix` at a value
/// - scales: candidate proposal scales; one is chosen per entry
/// - rng: The random number generator
pub fn mh_truncated_walk<F, R>(
    x: &[f64],
    ln_target: F,
    scales: &ProposalScales,
    rng: &mut R,
) -> FeatureWalk
where
    F: Fn(usize, f64) -> f64,
    R: Rng,
{
    let mut n_accepted = 0;
    let mut ln_trans = 0.0;
    let x_new: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(ix, &xi)| {
            let sigma = scales.choose(rng);
            let y = TruncatedUnitNormal::new(xi, sigma).draw(rng);
            let ln_a = ln_acceptance(ix, xi, y, sigma, &ln_target);

            if rng.gen::<f64>().ln() < ln_a {
                n_accepted += 1;
                ln_trans += ln_a.min(0.0);
                y
            } else {
                ln_trans += ln_clamped(-ln_a.exp_m1());
                xi
            }
        })
        .collect();

    FeatureWalk {
        x: x_new,
        n_accepted,
        ln_trans,
    }
}

/// Log probability that a walk started at `from` moves to exactly `to`,
/// summed over entries with each acceptance clipped at 0. Used to score
/// transitions that were never proposed.
pub fn ln_clipped_acceptance<F, R>(
    from: &[f64],
    to: &[f64],
    ln_target: F,
    scales: &ProposalScales,
    rng: &mut R,
) -> f64
where
    F: Fn(usize, f64) -> f64,
    R: Rng,
{
    from.iter()
        .zip(to.iter())
        .enumerate()
        .map(|(ix, (&x, &y))| {
            let sigma = scales.choose(rng);
            ln_acceptance(ix, x, y, sigma, &ln_target).min(0.0)
        })
        .sum()
}
