use super::State;

use dpclust_stats::prior_process::PriorProcessT;
use dpclust_utils::{normalize_ln_weights, pflip};
use rand::seq::SliceRandom;
use rand::Rng;

impl State {
    // Take the row out of its cluster. The cluster's id is freed if the row
    // was its last member.
    pub(crate) fn remove_row(&mut self, row_ix: usize) {
        self.asgn.unassign(row_ix);
    }

    pub(crate) fn reinsert_row<R: Rng>(
        &mut self,
        row_ix: usize,
        ln_singleton: f64,
        rng: &mut R,
    ) {
        let active = self.asgn.active_ids();
        let mut logps: Vec<f64> = Vec::with_capacity(active.len() + 1);

        active.iter().for_each(|&k| {
            let w = self.process.ln_gibbs_weight(self.asgn.counts[k]);
            logps.push(w + self.ln_f_row(row_ix, k));
        });
        logps.push(ln_singleton);

        let ix = pflip(&normalize_ln_weights(&logps), rng);

        let k_new = if ix == active.len() {
            // only N - 1 rows are assigned, so at most N - 1 of the N ids
            // are in use
            let k = self
                .asgn
                .smallest_free_id()
                .expect("an unassigned row leaves at least one id free");
            self.params[k] = self
                .likelihood
                .draw_params_from_row(self.data.row(row_ix), rng);
            k
        } else {
            active[ix]
        };

        self.asgn.reassign(row_ix, k_new);
    }

    /// Log weight of each row opening a new cluster. Depends only on the row
    /// and the concentration, so it is computed once per sweep.
    fn singleton_scores(&self) -> Vec<f64> {
        let ln_w = self.process.ln_singleton_weight();
        (0..self.n_rows())
            .map(|row_ix| {
                ln_w + self.likelihood.ln_f_singleton(
                    self.data.row(row_ix),
                    self.summaries[row_ix].n_missing,
                )
            })
            .collect()
    }

    pub fn reassign_row_gibbs<R: Rng>(
        &mut self,
        row_ix: usize,
        ln_singleton: f64,
        rng: &mut R,
    ) {
        self.remove_row(row_ix);
        self.reinsert_row(row_ix, ln_singleton, rng);
    }

    /// Use the standard Gibbs kernel to reassign the rows
    pub fn reassign_rows_gibbs<R: Rng>(&mut self, rng: &mut R) {
        let singletons = self.singleton_scores();

        // The algorithm is not valid if the rows are not scanned in random
        // order
        let mut row_ixs: Vec<usize> = (0..self.n_rows()).collect();
        row_ixs.shuffle(rng);

        for row_ix in row_ixs {
            self.reassign_row_gibbs(row_ix, singletons[row_ix], rng);
        }

        debug_assert!(self.asgn.validate().is_valid());
    }
}
