//! Single-chain lugsail batch-means potential scale reduction factor
//!
//! Vats, D. and Knudson, C. (2021). Revisiting the Gelman-Rubin diagnostic.
//! Statistical Science, 36(4), 518-529.

/// Minimum number of samples needed for a lugsail estimate
pub const MIN_PSRF_SAMPLES: usize = 9;

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Batch-means estimate of the asymptotic variance with batch size `b`
fn batch_means_var(xs: &[f64], b: usize) -> f64 {
    let n_batches = xs.len() / b;
    if n_batches < 2 {
        return 0.0;
    }
    let grand_mean = mean(&xs[..n_batches * b]);
    let ss: f64 = xs
        .chunks_exact(b)
        .map(|batch| (mean(batch) - grand_mean).powi(2))
        .sum();
    b as f64 * ss / (n_batches - 1) as f64
}

/// Lugsail PSRF of `trace[burn_in..n_steps]`.
///
/// Returns `f64::INFINITY` when fewer than [`MIN_PSRF_SAMPLES`] samples are
/// available and `1.0` when the samples are constant. Larger values mean the
/// chain is further from convergence.
///
/// # Example
///
/// ```
/// # use dpclust_stats::convergence::lugsail_psrf;
/// let trace = vec![-10.0; 100];
/// assert_eq!(lugsail_psrf(&trace, 0, 100), 1.0);
/// assert!(lugsail_psrf(&trace, 0, 5).is_infinite());
/// ```
pub fn lugsail_psrf(trace: &[f64], burn_in: usize, n_steps: usize) -> f64 {
    let end = n_steps.min(trace.len());
    if end <= burn_in || end - burn_in < MIN_PSRF_SAMPLES {
        return f64::INFINITY;
    }

    let xs = &trace[burn_in..end];
    let n = xs.len() as f64;
    let m = mean(xs);
    let s2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0);
    if s2 <= 0.0 || !s2.is_finite() {
        return 1.0;
    }

    let b = (n.sqrt().floor() as usize).max(3);
    let tau2 = 2.0 * batch_means_var(xs, b) - batch_means_var(xs, b / 3);
    let sigma2 = (n - 1.0) / n + tau2 / (n * s2);

    sigma2.max(0.0).sqrt()
}
