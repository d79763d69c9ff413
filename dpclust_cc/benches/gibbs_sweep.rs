use criterion::BatchSize;
use criterion::Criterion;
use criterion::{black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use dpclust_cc::alg::RowAssignAlg;
use dpclust_cc::config::{InitMode, StateConfig};
use dpclust_cc::state::State;
use dpclust_cc::transition::StateTransition;
use dpclust_consts::N_RESTRICTED_SCANS;
use dpclust_data::BinaryMatrix;

const NROWS: usize = 500;
const NCOLS: usize = 50;
const NGROUPS: usize = 5;

fn gen_data<R: Rng>(rng: &mut R) -> BinaryMatrix {
    let group_params: Vec<Vec<f64>> = (0..NGROUPS)
        .map(|_| (0..NCOLS).map(|_| rng.gen::<f64>()).collect())
        .collect();
    let rows = (0..NROWS)
        .map(|ix| {
            group_params[ix % NGROUPS]
                .iter()
                .map(|&p| {
                    if rng.gen::<f64>() < 0.05 {
                        None
                    } else {
                        Some(rng.gen::<f64>() < p)
                    }
                })
                .collect()
        })
        .collect();
    BinaryMatrix::new(rows).unwrap()
}

macro_rules! state_type_bench {
    ($id: expr, $fn: ident, $transition: expr, $init_mode: expr) => {
        fn $fn(c: &mut Criterion) {
            c.bench_function($id, |b| {
                let mut rng = Xoshiro256Plus::seed_from_u64(1337);
                let data = gen_data(&mut rng);
                let config = StateConfig::default()
                    .error_rates(0.01, 0.05)
                    .init_mode($init_mode);

                b.iter_batched(
                    || State::new(data.clone(), &config, &mut rng).unwrap(),
                    |mut state| {
                        state.step(&[$transition], &mut rng);
                        black_box(state.n_clusters())
                    },
                    BatchSize::LargeInput,
                )
            });
        }
    };
}

state_type_bench!(
    "gibbs-sweep-together",
    bench_gibbs_together,
    StateTransition::RowAssignment(RowAssignAlg::Gibbs),
    InitMode::Together
);

state_type_bench!(
    "gibbs-sweep-separate",
    bench_gibbs_separate,
    StateTransition::RowAssignment(RowAssignAlg::Gibbs),
    InitMode::Separate
);

state_type_bench!(
    "split-merge-together",
    bench_split_merge_together,
    StateTransition::RowAssignment(RowAssignAlg::SplitMerge {
        split_prob: 1.0,
        n_scans: N_RESTRICTED_SCANS,
    }),
    InitMode::Together
);

state_type_bench!(
    "component-params-separate",
    bench_params_separate,
    StateTransition::ComponentParams,
    InitMode::Separate
);

criterion_group!(
    benches,
    bench_gibbs_together,
    bench_gibbs_separate,
    bench_split_merge_together,
    bench_params_separate,
);
criterion_main!(benches);
