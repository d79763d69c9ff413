//! Arena of cluster slots for a partition of the observations
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker for an observation that is currently not in any cluster
pub const UNASSIGNED: usize = usize::MAX;

/// Validates assignments if the `DPCLUST_NOCHECK` is not set to `"1"`.
#[macro_export]
macro_rules! validate_assignment {
    ($asgn:expr) => {{
        let validate_asgn: bool = match option_env!("DPCLUST_NOCHECK") {
            Some(value) => value != "1",
            None => true,
        };
        if validate_asgn {
            $asgn.validate().is_valid()
        } else {
            true
        }
    }};
}

/// Partition of `n` observations into clusters with ids in `[0, n)`.
///
/// Cluster ids index into `counts`, which has one slot per observation. A
/// slot with a count of zero is free and its id may be handed out again.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Assignment {
    /// `asgn[i]` is the cluster id of the i<sup>th</sup> observation
    pub asgn: Vec<usize>,
    /// Number of observations in each cluster slot
    pub counts: Vec<usize>,
    /// The number of active clusters
    pub n_cats: usize,
}

/// The possible ways an assignment can go wrong with incorrect bookkeeping
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
pub struct AssignmentDiagnostics {
    /// There is exactly one count slot per observation
    counts_len_is_n: bool,
    /// Every entry of `asgn` is an id in `[0, n)`
    ids_in_range: bool,
    /// The sum of `counts` should be the number of data
    sum_counts_cmp_n: bool,
    /// The occurrences of each id in `asgn` match `counts`
    asgn_agrees_with_counts: bool,
    /// `n_cats` is the number of non-zero counts
    n_cats_agrees_with_counts: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("The number of count slots does not equal the number of data")]
    CountsLengthNotN,
    #[error("One or more cluster ids are outside [0, n)")]
    ClusterIdOutOfRange,
    #[error("The sum of counts does not equal the number of data")]
    SumCountsNotEqualToAssignmentLength,
    #[error("The counts do not agree with the assignment")]
    AssignmentAndCountsDisagree,
    #[error("n_cats does not equal the number of non-empty clusters")]
    NCatsDisagreesWithCounts,
    #[error("An assignment must contain at least one datum")]
    Empty,
}

impl AssignmentDiagnostics {
    pub fn new(asgn: &Assignment) -> Self {
        let n = asgn.asgn.len();
        AssignmentDiagnostics {
            counts_len_is_n: asgn.counts.len() == n,
            ids_in_range: asgn.asgn.iter().all(|&z| z < n),
            sum_counts_cmp_n: {
                let total: usize = asgn.counts.iter().sum();
                total == n
            },
            asgn_agrees_with_counts: {
                let mut tally = vec![0_usize; asgn.counts.len()];
                let mut in_bounds = true;
                for &z in asgn.asgn.iter() {
                    match tally.get_mut(z) {
                        Some(ct) => *ct += 1,
                        None => in_bounds = false,
                    }
                }
                in_bounds && tally == asgn.counts
            },
            n_cats_agrees_with_counts: {
                asgn.counts.iter().filter(|&&ct| ct > 0).count() == asgn.n_cats
            },
        }
    }

    /// `true` if none of diagnostics was violated
    pub fn is_valid(&self) -> bool {
        self.counts_len_is_n
            && self.ids_in_range
            && self.sum_counts_cmp_n
            && self.asgn_agrees_with_counts
            && self.n_cats_agrees_with_counts
    }

    pub fn emit_error(&self) -> Result<(), AssignmentError> {
        let checks = [
            (self.counts_len_is_n, AssignmentError::CountsLengthNotN),
            (self.ids_in_range, AssignmentError::ClusterIdOutOfRange),
            (
                self.sum_counts_cmp_n,
                AssignmentError::SumCountsNotEqualToAssignmentLength,
            ),
            (
                self.asgn_agrees_with_counts,
                AssignmentError::AssignmentAndCountsDisagree,
            ),
            (
                self.n_cats_agrees_with_counts,
                AssignmentError::NCatsDisagreesWithCounts,
            ),
        ];
        checks
            .into_iter()
            .map(|(ok, err)| if ok { Ok(()) } else { Err(err) })
            .collect()
    }
}

impl Assignment {
    /// Every observation in cluster 0
    pub fn together(n: usize) -> Result<Self, AssignmentError> {
        Self::from_vec(vec![0; n])
    }

    /// Observation `i` in cluster `i`
    pub fn separate(n: usize) -> Result<Self, AssignmentError> {
        Self::from_vec((0..n).collect())
    }

    /// Build from an assignment vector whose ids lie in `[0, n)`
    ///
    /// # Example
    ///
    /// ```
    /// # use dpclust_stats::assignment::Assignment;
    /// let asgn = Assignment::from_vec(vec![0, 0, 3, 3]).unwrap();
    ///
    /// assert_eq!(asgn.n_cats, 2);
    /// assert_eq!(asgn.counts, vec![2, 0, 0, 2]);
    /// assert_eq!(asgn.smallest_free_id(), Some(1));
    /// ```
    pub fn from_vec(asgn: Vec<usize>) -> Result<Self, AssignmentError> {
        let n = asgn.len();
        if n == 0 {
            return Err(AssignmentError::Empty);
        }

        let mut counts = vec![0_usize; n];
        for &z in &asgn {
            match counts.get_mut(z) {
                Some(ct) => *ct += 1,
                None => return Err(AssignmentError::ClusterIdOutOfRange),
            }
        }
        let n_cats = counts.iter().filter(|&&ct| ct > 0).count();

        let asgn = Self {
            asgn,
            counts,
            n_cats,
        };

        if validate_assignment!(asgn) {
            Ok(asgn)
        } else {
            asgn.validate().emit_error().map(|_| asgn)
        }
    }

    /// Create and iterator for the assignment vector
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.asgn.iter()
    }

    pub fn len(&self) -> usize {
        self.asgn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_active(&self, k: usize) -> bool {
        self.counts[k] > 0
    }

    /// Ids of the clusters with at least one member, in increasing order
    pub fn active_ids(&self) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter_map(|(k, &ct)| if ct > 0 { Some(k) } else { None })
            .collect()
    }

    /// Indices of the observations in cluster `k`, in increasing order
    pub fn members(&self, k: usize) -> Vec<usize> {
        self.asgn
            .iter()
            .enumerate()
            .filter_map(|(ix, &z)| if z == k { Some(ix) } else { None })
            .collect()
    }

    /// The smallest id that no observation currently uses
    pub fn smallest_free_id(&self) -> Option<usize> {
        self.counts.iter().position(|&ct| ct == 0)
    }

    /// Largest active cluster id
    pub fn max_active_id(&self) -> Option<usize> {
        self.counts.iter().rposition(|&ct| ct > 0)
    }

    /// Mark the entry at ix as unassigned. Returns `true` if its cluster was
    /// emptied and its id freed.
    pub fn unassign(&mut self, ix: usize) -> bool {
        let k = self.asgn[ix];
        if k == UNASSIGNED {
            return false;
        }

        self.asgn[ix] = UNASSIGNED;
        self.counts[k] -= 1;
        if self.counts[k] == 0 {
            self.n_cats -= 1;
            true
        } else {
            false
        }
    }

    /// Reassign an unassigned entry to cluster `k`, activating `k` if it was
    /// free.
    ///
    /// # Panics
    ///
    /// If `ix` is still assigned or `k` is not a valid id
    pub fn reassign(&mut self, ix: usize, k: usize) {
        if self.asgn[ix] != UNASSIGNED {
            panic!("Entry {} is assigned. Unassign it first", ix);
        } else if k >= self.counts.len() {
            panic!("k ({}) larger than the number of slots", k);
        }

        if self.counts[k] == 0 {
            self.n_cats += 1;
        }
        self.counts[k] += 1;
        self.asgn[ix] = k;
    }

    /// Move an assigned entry from its cluster into cluster `k`
    pub fn transfer(&mut self, ix: usize, k: usize) {
        self.unassign(ix);
        self.reassign(ix, k);
    }

    /// Validates the assignment
    pub fn validate(&self) -> AssignmentDiagnostics {
        AssignmentDiagnostics::new(self)
    }
}
