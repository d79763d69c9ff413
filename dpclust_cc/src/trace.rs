//! Storage of the samples of a run
use serde::{Deserialize, Serialize};

use crate::state::State;
use dpclust_consts::TRACE_BLOCK_SIZE;
use dpclust_utils::argmax;

/// The recorded samples of a chain.
///
/// Buffers are allocated ahead of the samples and grow by a block of
/// `min(TRACE_BLOCK_SIZE, capacity)` rows whenever a sample does not fit.
/// Parameter snapshots are padded to the largest cluster id ever observed,
/// with zeros for inactive slots. Call [`Trace::finish`] at the end of a
/// run to drop unused rows and set the burn-in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Trace {
    loglike: Vec<f64>,
    logpost: Vec<f64>,
    alpha: Vec<f64>,
    asgn: Vec<Vec<usize>>,
    /// `[step][slot][feature]`
    params: Vec<Vec<Vec<f64>>>,
    n_samples: usize,
    n_slots: usize,
    n_cols: usize,
    burn_in: usize,
}

impl Trace {
    /// An empty trace with room for `capacity` samples of `n_cols` features
    pub fn with_capacity(capacity: usize, n_cols: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            loglike: vec![0.0; capacity],
            logpost: vec![0.0; capacity],
            alpha: vec![0.0; capacity],
            asgn: vec![Vec::new(); capacity],
            params: vec![Vec::new(); capacity],
            n_samples: 0,
            n_slots: 0,
            n_cols,
            burn_in: 0,
        }
    }

    /// Number of rows allocated
    pub fn capacity(&self) -> usize {
        self.loglike.len()
    }

    fn grow(&mut self) {
        let block = TRACE_BLOCK_SIZE.min(self.capacity());
        let new_len = self.capacity() + block;
        self.loglike.resize(new_len, 0.0);
        self.logpost.resize(new_len, 0.0);
        self.alpha.resize(new_len, 0.0);
        self.asgn.resize(new_len, Vec::new());
        self.params.resize(new_len, Vec::new());
    }

    fn pad_slots(&mut self, n_slots: usize) {
        let n_cols = self.n_cols;
        self.params[..self.n_samples].iter_mut().for_each(|slots| {
            slots.resize(n_slots, vec![0.0; n_cols]);
        });
        self.n_slots = n_slots;
    }

    /// Record the current state as the next sample
    pub fn push(&mut self, state: &State) {
        if self.n_samples == self.capacity() {
            self.grow();
        }

        let n_slots = state.asgn.max_active_id().map_or(0, |k| k + 1);
        if n_slots > self.n_slots {
            self.pad_slots(n_slots);
        }

        let params = (0..self.n_slots)
            .map(|k| {
                if state.asgn.is_active(k) {
                    state.params(k).to_vec()
                } else {
                    vec![0.0; self.n_cols]
                }
            })
            .collect();

        let ix = self.n_samples;
        let loglike = state.loglike();
        self.loglike[ix] = loglike;
        self.logpost[ix] = loglike + state.log_prior();
        self.alpha[ix] = state.alpha();
        self.asgn[ix] = state.asgn.asgn.clone();
        self.params[ix] = params;
        self.n_samples += 1;
    }

    /// Drop unused rows and set the burn-in index
    pub fn finish(&mut self, burn_in: usize) {
        let n = self.n_samples;
        self.loglike.truncate(n);
        self.logpost.truncate(n);
        self.alpha.truncate(n);
        self.asgn.truncate(n);
        self.params.truncate(n);
        self.burn_in = burn_in.min(n);
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.n_samples
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Index of the first sample after burn-in
    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    /// Number of cluster slots of every parameter snapshot
    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    pub fn loglike(&self) -> &[f64] {
        &self.loglike[..self.n_samples]
    }

    pub fn logpost(&self) -> &[f64] {
        &self.logpost[..self.n_samples]
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha[..self.n_samples]
    }

    pub fn asgn(&self, step: usize) -> &[usize] {
        &self.asgn[step]
    }

    /// Parameter snapshot of `step`, one row per cluster slot. Snapshots
    /// recorded before a slot was first used are padded when read.
    pub fn params(&self, step: usize) -> Vec<Vec<f64>> {
        let mut params = self.params[step].clone();
        params.resize(self.n_slots, vec![0.0; self.n_cols]);
        params
    }

    /// Number of clusters of each sample
    pub fn n_clusters(&self) -> Vec<usize> {
        self.asgn[..self.n_samples]
            .iter()
            .map(|asgn| {
                let mut ids = asgn.clone();
                ids.sort_unstable();
                ids.dedup();
                ids.len()
            })
            .collect()
    }

    /// Step of the maximum a posteriori sample after burn-in, or `None` if
    /// every sample is burn-in
    pub fn map_index(&self) -> Option<usize> {
        let logpost = &self.logpost()[self.burn_in..];
        if logpost.is_empty() {
            None
        } else {
            Some(self.burn_in + argmax(logpost))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitMode, StateConfig};
    use approx::*;
    use dpclust_data::BinaryMatrix;
    use dpclust_stats::assignment::Assignment;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn state(init_mode: InitMode) -> State {
        let data = BinaryMatrix::new(vec![
            vec![Some(true), Some(true)],
            vec![Some(true), None],
            vec![Some(false), Some(false)],
        ])
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let config = StateConfig::default().init_mode(init_mode);
        State::new(data, &config, &mut rng).unwrap()
    }

    #[test]
    fn grows_by_blocks_without_losing_samples() {
        let state = state(InitMode::Together);
        let mut trace = Trace::with_capacity(2, 2);
        for _ in 0..5 {
            trace.push(&state);
        }
        assert_eq!(trace.len(), 5);
        // 2 -> 4 -> 8
        assert_eq!(trace.capacity(), 8);
        assert!(trace
            .loglike()
            .iter()
            .all(|&ll| ll == state.loglike()));

        trace.finish(2);
        assert_eq!(trace.capacity(), 5);
        assert_eq!(trace.burn_in(), 2);
    }

    #[test]
    fn logpost_is_loglike_plus_prior() {
        let state = state(InitMode::Separate);
        let mut trace = Trace::with_capacity(1, 2);
        trace.push(&state);
        assert_relative_eq!(
            trace.logpost()[0],
            state.log_posterior(),
            epsilon = 1E-10
        );
        assert_eq!(trace.alpha()[0], state.alpha());
        assert_eq!(trace.asgn(0), &[0, 1, 2]);
    }

    #[test]
    fn params_are_padded_to_largest_id() {
        let mut state = state(InitMode::Separate);
        let mut trace = Trace::with_capacity(4, 2);

        state.asgn = Assignment::from_vec(vec![0, 0, 0]).unwrap();
        trace.push(&state);
        assert_eq!(trace.n_slots(), 1);

        state.asgn = Assignment::from_vec(vec![0, 2, 0]).unwrap();
        trace.push(&state);
        assert_eq!(trace.n_slots(), 3);

        let first = trace.params(0);
        assert_eq!(first.len(), 3);
        assert_eq!(first[1], vec![0.0, 0.0]);
        assert_eq!(first[2], vec![0.0, 0.0]);

        let second = trace.params(1);
        assert_eq!(second[1], vec![0.0, 0.0]);
        assert_eq!(second[2], state.params(2).to_vec());
    }

    #[test]
    fn n_clusters_and_map_index() {
        let mut state = state(InitMode::Separate);
        let mut trace = Trace::with_capacity(4, 2);
        trace.push(&state);
        state.asgn = Assignment::from_vec(vec![0, 0, 1]).unwrap();
        trace.push(&state);
        trace.finish(1);

        assert_eq!(trace.n_clusters(), vec![3, 2]);
        assert_eq!(trace.map_index(), Some(1));

        trace.finish(2);
        assert_eq!(trace.map_index(), None);
    }

    #[test]
    fn burn_in_is_capped_at_len() {
        let state = state(InitMode::Together);
        let mut trace = Trace::with_capacity(10, 2);
        trace.push(&state);
        trace.finish(5);
        assert_eq!(trace.burn_in(), 1);
        assert!(!trace.is_empty());
    }
}
