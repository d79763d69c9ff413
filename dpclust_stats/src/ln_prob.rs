//! Guarded logarithms and two-way normalization
use dpclust_consts::{EPSILON, LN_EPSILON};

/// `ln(x)` with `x` floored at `EPSILON`, so `0` maps to `LN_EPSILON`
/// instead of `-inf`.
#[inline]
pub fn ln_clamped(x: f64) -> f64 {
    if x > EPSILON {
        x.ln()
    } else {
        LN_EPSILON
    }
}

/// Normalize a pair of log weights in log space.
///
/// When the smaller weight underflows after shifting by the larger one, all
/// but `EPSILON` of the mass goes to the strictly larger entry.
///
/// # Example
///
/// ```
/// # use dpclust_stats::normalize_ln_pair;
/// # use dpclust_consts::LN_EPSILON;
/// let [a, b] = normalize_ln_pair(0.0, -1E4);
/// assert_eq!(a, 0.0);
/// assert_eq!(b, LN_EPSILON);
/// ```
pub fn normalize_ln_pair(x0: f64, x1: f64) -> [f64; 2] {
    let (max_val, other) = if x0 >= x1 { (x0, x1) } else { (x1, x0) };
    let rest = (other - max_val).exp();

    if rest == 0.0 || !rest.is_finite() {
        if x0 > x1 {
            [0.0, LN_EPSILON]
        } else {
            [LN_EPSILON, 0.0]
        }
    } else {
        let ln_z = max_val + rest.ln_1p();
        [x0 - ln_z, x1 - ln_z]
    }
}
