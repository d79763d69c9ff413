//! Dense storage of ternary observations
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RowSummary;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// The matrix has no rows or no columns
    #[error("the observation matrix must have at least one row and column")]
    Empty,
    /// Rows of different length
    #[error("row {row} has {found} values but the first row has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A value that is neither 0, 1, nor NaN
    #[error("value {value} at ({row}, {col}) is not 0, 1, or NaN")]
    NonBinaryValue { row: usize, col: usize, value: f64 },
}

/// An N×M table of observations, each `Some(bool)` or `None` when missing.
///
/// Storage is row-major.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryMatrix {
    n_rows: usize,
    n_cols: usize,
    values: Vec<Option<bool>>,
}

impl BinaryMatrix {
    /// Build from a vector of rows
    ///
    /// # Example
    ///
    /// ```
    /// # use dpclust_data::BinaryMatrix;
    /// let data = BinaryMatrix::new(vec![
    ///     vec![Some(true), None],
    ///     vec![Some(false), Some(true)],
    /// ]).unwrap();
    ///
    /// assert_eq!(data.n_rows(), 2);
    /// assert_eq!(data.get(0, 1), None);
    /// assert_eq!(data.get(1, 1), Some(true));
    /// ```
    pub fn new(rows: Vec<Vec<Option<bool>>>) -> Result<Self, DataError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|row| row.len()).unwrap_or(0);
        if n_rows == 0 || n_cols == 0 {
            return Err(DataError::Empty);
        }

        let mut values = Vec::with_capacity(n_rows * n_cols);
        for (ix, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(DataError::RaggedRow {
                    row: ix,
                    expected: n_cols,
                    found: row.len(),
                });
            }
            values.extend(row);
        }

        Ok(Self {
            n_rows,
            n_cols,
            values,
        })
    }

    /// Build from floating point rows where `0.0` and `1.0` are observations
    /// and `NaN` is missing.
    pub fn from_f64_rows(rows: &[Vec<f64>]) -> Result<Self, DataError> {
        let converted = rows
            .iter()
            .enumerate()
            .map(|(row_ix, row)| {
                row.iter()
                    .enumerate()
                    .map(|(col_ix, &x)| {
                        if x.is_nan() {
                            Ok(None)
                        } else if x == 0.0 {
                            Ok(Some(false))
                        } else if x == 1.0 {
                            Ok(Some(true))
                        } else {
                            Err(DataError::NonBinaryValue {
                                row: row_ix,
                                col: col_ix,
                                value: x,
                            })
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(converted)
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn get(&self, row_ix: usize, col_ix: usize) -> Option<bool> {
        self.values[row_ix * self.n_cols + col_ix]
    }

    /// The observations of one row
    #[inline]
    pub fn row(&self, row_ix: usize) -> &[Option<bool>] {
        let start = row_ix * self.n_cols;
        &self.values[start..start + self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<bool>]> {
        self.values.chunks(self.n_cols)
    }

    /// Per-row counts of zeros, ones, and missing values
    pub fn summaries(&self) -> Vec<RowSummary> {
        self.rows().map(RowSummary::from_row).collect()
    }
}
