use std::cmp::Ordering;

/// Choose two distinct random numbers in [0, ..., n-1]
pub fn choose2ixs<R: rand::Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    match n.cmp(&2) {
        Ordering::Greater => {
            let i: usize = rng.gen_range(0..n);
            loop {
                let j: usize = rng.gen_range(0..n);
                if j != i {
                    return (i, j);
                }
            }
        }
        Ordering::Equal => {
            if rng.gen::<bool>() {
                (0, 1)
            } else {
                (1, 0)
            }
        }
        Ordering::Less => panic!("n must be 2 or greater"),
    }
}

/// Draw an index from a vector of normalized (or unnormalized) linear-space
/// weights.
pub fn pflip<R: rand::Rng>(weights: &[f64], rng: &mut R) -> usize {
    assert!(!weights.is_empty(), "Empty container");

    let cws = crate::cumsum(weights);
    let total = cws[cws.len() - 1];
    let r: f64 = rng.gen::<f64>() * total;

    cws.iter()
        .position(|&w| r < w)
        // r can only reach the total through round-off
        .unwrap_or_else(|| {
            weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
        })
}

/// Draw an index with probability proportional to `weights`, skipping the
/// indices in `exclude`.
pub fn pflip_excluding<R: rand::Rng>(
    weights: &[f64],
    exclude: &[usize],
    rng: &mut R,
) -> usize {
    let masked: Vec<f64> = weights
        .iter()
        .enumerate()
        .map(|(ix, &w)| if exclude.contains(&ix) { 0.0 } else { w })
        .collect();
    pflip(&masked, rng)
}
