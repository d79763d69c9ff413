use dpclust_data::BinaryMatrix;
use dpclust_stats::likelihood::{BinaryLikelihood, FeatureCounts};
use dpclust_stats::mh::{mh_truncated_walk, ProposalScales};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn data() -> BinaryMatrix {
    // feature 0 is mostly on, feature 1 mostly off, feature 2 always missing
    let rows = (0..40)
        .map(|i| vec![Some(i % 10 != 0), Some(i % 10 == 0), None])
        .collect();
    BinaryMatrix::new(rows).unwrap()
}

#[test]
fn walk_finds_feature_frequencies() {
    let data = data();
    let lik = BinaryLikelihood::new(0.01, 0.01, 1.0, 1.0).unwrap();
    let rows: Vec<usize> = (0..data.n_rows()).collect();
    let counts = FeatureCounts::from_rows(&data, &rows);

    let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
    let mut scales = ProposalScales::default();
    let mut theta = vec![0.5; 3];
    let mut sums = vec![0.0; 3];
    let n_iters = 3_000;
    let burn = 500;

    for iter in 0..n_iters {
        let walk = mh_truncated_walk(
            &theta,
            |f, p| lik.ln_param_target(counts.ones[f], counts.zeros[f], p),
            &scales,
            &mut rng,
        );
        scales.record(walk.n_accepted, theta.len());
        if iter % 20 == 0 {
            scales.adapt();
        }
        theta = walk.x;
        if iter >= burn {
            sums.iter_mut().zip(theta.iter()).for_each(|(s, t)| *s += t);
        }
    }

    let means: Vec<f64> =
        sums.iter().map(|s| s / (n_iters - burn) as f64).collect();

    assert!((means[0] - 0.9).abs() < 0.1, "means = {:?}", means);
    assert!((means[1] - 0.1).abs() < 0.1, "means = {:?}", means);
    // No data: the posterior is the uniform prior
    assert!((means[2] - 0.5).abs() < 0.15, "means = {:?}", means);
}

#[test]
fn posterior_draws_track_counts() {
    let data = data();
    let lik = BinaryLikelihood::new(0.01, 0.01, 1.0, 1.0).unwrap();
    let rows: Vec<usize> = (0..data.n_rows()).collect();
    let counts = FeatureCounts::from_rows(&data, &rows);
    assert_eq!(counts.ones, vec![36, 4, 0]);
    assert_eq!(counts.zeros, vec![4, 36, 0]);

    let mut rng = Xoshiro256Plus::seed_from_u64(99);
    let n = 2_000;
    let mean0 = (0..n)
        .map(|_| lik.draw_params(&counts, &mut rng)[0])
        .sum::<f64>()
        / n as f64;
    // Beta(37, 5) has mean 37 / 42
    assert!((mean0 - 37.0 / 42.0).abs() < 0.02);
}
