use std::ops::AddAssign;

/// Cumulative sum of `xs`
#[inline]
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Clone,
{
    let mut summed: Vec<T> = xs.to_vec();
    for i in 1..xs.len() {
        let l = summed[i - 1].clone();
        summed[i] += l;
    }
    summed
}

/// Returns the index of the largest element in xs.
///
/// If there are multiple largest elements, returns the index of the first.
/// NaN entries are never selected unless every entry is NaN.
#[inline]
pub fn argmax(xs: &[f64]) -> usize {
    assert!(!xs.is_empty(), "Empty container");

    let (max_ix, _) = xs.iter().enumerate().skip(1).fold(
        (0, xs[0]),
        |(max_ix, max_val), (ix, &x)| {
            if x > max_val || (max_val.is_nan() && !x.is_nan()) {
                (ix, x)
            } else {
                (max_ix, max_val)
            }
        },
    );
    max_ix
}

/// Normalize log weights, staying in log space.
///
/// The largest entry is subtracted before anything is exponentiated, and the
/// remaining mass is folded in with `ln_1p`, so `exp` is only ever applied to
/// non-positive values.
pub fn ln_normalize(ln_weights: &[f64]) -> Vec<f64> {
    assert!(!ln_weights.is_empty(), "Empty container");

    let max_ix = argmax(ln_weights);
    let max_val = ln_weights[max_ix];
    let rest: f64 = ln_weights
        .iter()
        .enumerate()
        .filter(|&(ix, x)| ix != max_ix && !x.is_nan())
        .map(|(_, x)| (x - max_val).exp())
        .sum();
    let ln_z = max_val + rest.ln_1p();

    ln_weights.iter().map(|x| x - ln_z).collect()
}

/// Normalize log weights into a probability vector that sums to one.
///
/// # Example
///
/// ```
/// # use dpclust_utils::normalize_ln_weights;
/// let ps = normalize_ln_weights(&[-1000.0, -1000.0]);
/// assert!((ps[0] - 0.5).abs() < 1E-12);
/// assert!((ps[1] - 0.5).abs() < 1E-12);
/// ```
pub fn normalize_ln_weights(ln_weights: &[f64]) -> Vec<f64> {
    ln_normalize(ln_weights)
        .iter()
        .map(|x| if x.is_nan() { 0.0 } else { x.exp() })
        .collect()
}
