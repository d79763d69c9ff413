use approx::*;
use dpclust_cc::alg::RowAssignAlg;
use dpclust_cc::config::{InitMode, StateConfig, StepConfig};
use dpclust_cc::state::State;
use dpclust_cc::trace::Trace;
use dpclust_cc::transition::StateTransition;
use dpclust_data::BinaryMatrix;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

fn gen_data<R: Rng>(n_rows: usize, n_cols: usize, rng: &mut R) -> BinaryMatrix {
    let rows = (0..n_rows)
        .map(|ix| {
            (0..n_cols)
                .map(|jx| {
                    let r: f64 = rng.gen();
                    if r < 0.1 {
                        None
                    } else {
                        // two noisy groups with complementary profiles
                        let p = if (ix % 2 == 0) == (jx % 2 == 0) {
                            0.9
                        } else {
                            0.1
                        };
                        Some(rng.gen::<f64>() < p)
                    }
                })
                .collect()
        })
        .collect();
    BinaryMatrix::new(rows).unwrap()
}

fn assert_consistent(state: &State) {
    let asgn = &state.asgn;
    assert!(asgn.validate().is_valid());
    assert_eq!(asgn.counts.iter().sum::<usize>(), state.n_rows());
    assert!(asgn.iter().all(|&k| k < state.n_rows()));
    assert_eq!(asgn.active_ids().len(), state.n_clusters());
    for k in asgn.active_ids() {
        assert_eq!(state.params(k).len(), state.n_cols());
        assert!(state.params(k).iter().all(|p| (0.0..=1.0).contains(p)));
    }
}

#[test]
fn one_gibbs_sweep_on_tiny_data() {
    let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
    let data = gen_data(4, 3, &mut rng);
    let mut state =
        State::new(data, &StateConfig::default(), &mut rng).unwrap();

    state.step(
        &[StateTransition::RowAssignment(RowAssignAlg::Gibbs)],
        &mut rng,
    );

    assert_eq!(state.asgn.counts.iter().sum::<usize>(), 4);
    assert_consistent(&state);
}

#[test]
fn mixed_steps_keep_state_consistent() {
    let mut rng = Xoshiro256Plus::seed_from_u64(0xABCD);
    let data = gen_data(30, 10, &mut rng);
    let config = StateConfig::default().error_rates(0.05, 0.05);
    let mut state = State::new(data, &config, &mut rng).unwrap();
    let step_config = StepConfig::default().sm_prob(0.5).conc_prob(0.5);

    for _ in 0..50 {
        let transitions = step_config.draw_transitions(&mut rng);
        state.step(&transitions, &mut rng);
        assert_consistent(&state);
        assert!(state.alpha() > 1.0);
        assert!(state.loglike().is_finite());
        assert!(state.log_prior().is_finite());
    }

    let acceptance = state.acceptance();
    assert!(acceptance.params.total() > 0);
    assert!(acceptance.splits.total() + acceptance.merges.total() > 0);
}

#[test]
fn split_merge_only_chain_from_separate_init() {
    let mut rng = Xoshiro256Plus::seed_from_u64(99);
    let data = gen_data(12, 6, &mut rng);
    let config = StateConfig::default()
        .error_rates(0.05, 0.05)
        .init_mode(InitMode::Separate);
    let mut state = State::new(data, &config, &mut rng).unwrap();
    let transitions = [
        StateTransition::RowAssignment(RowAssignAlg::SplitMerge {
            split_prob: 0.5,
            n_scans: 3,
        }),
        StateTransition::ComponentParams,
    ];

    for _ in 0..100 {
        state.step(&transitions, &mut rng);
        assert_consistent(&state);
    }
    assert!(state.acceptance().merges.total() > 0);
}

#[test]
fn gibbs_finds_two_groups() {
    let mut rng = Xoshiro256Plus::seed_from_u64(17);
    let data = gen_data(40, 20, &mut rng);
    let config = StateConfig::default().error_rates(0.01, 0.01);
    let mut state = State::new(data, &config, &mut rng).unwrap();
    let transitions = [
        StateTransition::RowAssignment(RowAssignAlg::Gibbs),
        StateTransition::ComponentParams,
    ];

    let ll_start = state.loglike();
    for _ in 0..100 {
        state.step(&transitions, &mut rng);
    }
    assert!(state.loglike() > ll_start);

    // no cluster mixes the two groups
    for k in state.asgn.active_ids() {
        let members = state.asgn.members(k);
        let parity = members[0] % 2;
        assert!(members.iter().all(|ix| ix % 2 == parity));
    }
}

#[test]
fn state_serde_round_trip() {
    let mut rng = Xoshiro256Plus::seed_from_u64(3);
    let data = gen_data(8, 4, &mut rng);
    let mut state =
        State::new(data, &StateConfig::default(), &mut rng).unwrap();
    state.step(&StepConfig::default().draw_transitions(&mut rng), &mut rng);

    let json = serde_json::to_string(&state).unwrap();
    let back: State = serde_json::from_str(&json).unwrap();
    assert_eq!(back.asgn, state.asgn);
    assert_relative_eq!(back.alpha(), state.alpha(), epsilon = 1E-12);
    assert_relative_eq!(back.loglike(), state.loglike(), epsilon = 1E-8);
}

#[test]
fn trace_records_every_step() {
    let mut rng = Xoshiro256Plus::seed_from_u64(5);
    let data = gen_data(10, 4, &mut rng);
    let mut state =
        State::new(data, &StateConfig::default(), &mut rng).unwrap();
    let step_config = StepConfig::default();

    let mut trace = Trace::with_capacity(3, state.n_cols());
    trace.push(&state);
    for _ in 0..10 {
        state.step(&step_config.draw_transitions(&mut rng), &mut rng);
        trace.push(&state);
    }
    trace.finish(5);

    assert_eq!(trace.len(), 11);
    assert_eq!(trace.burn_in(), 5);
    assert_eq!(trace.asgn(10), state.asgn.asgn.as_slice());
    let n_slots = trace.n_slots();
    assert!((0..11).all(|step| trace.params(step).len() == n_slots));
    assert!(trace.map_index().map_or(false, |ix| ix >= 5));
}
