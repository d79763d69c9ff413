use serde::{Deserialize, Serialize};

/// Counts of each kind of value in one observation vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowSummary {
    pub n_zeros: usize,
    pub n_ones: usize,
    pub n_missing: usize,
}

impl RowSummary {
    pub fn from_row(row: &[Option<bool>]) -> Self {
        row.iter().fold(Self::default(), |mut acc, x| {
            match x {
                Some(true) => acc.n_ones += 1,
                Some(false) => acc.n_zeros += 1,
                None => acc.n_missing += 1,
            }
            acc
        })
    }

    /// Number of observed (non-missing) values
    #[inline]
    pub fn n_present(&self) -> usize {
        self.n_zeros + self.n_ones
    }
}
