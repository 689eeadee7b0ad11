//! Mean Imputation

use crate::features::FeatureTable;
use crate::statistics::ColumnStatistics;
use crate::FeatureError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-column fill values, fit once at training time and reused verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationTable {
    /// Column names the means belong to
    pub columns: Vec<String>,
    /// Mean of the present values per column (0.0 for all-missing columns)
    pub means: Vec<f64>,
}

impl ImputationTable {
    /// Fit column means over a table, skipping missing values
    pub fn fit(table: &FeatureTable) -> Self {
        let means = table
            .values
            .columns()
            .into_iter()
            .map(|col| {
                let stats = ColumnStatistics::compute(col.iter());
                if stats.count == 0 {
                    0.0
                } else {
                    stats.mean
                }
            })
            .collect();

        Self {
            columns: table.columns.clone(),
            means,
        }
    }

    /// Replace missing values in place; returns how many cells were filled
    pub fn apply(&self, table: &mut FeatureTable) -> Result<usize, FeatureError> {
        if table.n_cols() != self.means.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.means.len(),
                actual: table.n_cols(),
            });
        }

        let mut filled = 0;
        for mut row in table.values.rows_mut() {
            for (cell, mean) in row.iter_mut().zip(&self.means) {
                if cell.is_nan() {
                    *cell = *mean;
                    filled += 1;
                }
            }
        }

        debug!("Imputed {} missing cells", filled);
        Ok(filled)
    }

    /// Fill missing values of a single vector
    pub fn apply_row(&self, row: &mut [f64]) -> Result<(), FeatureError> {
        if row.len() != self.means.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        for (cell, mean) in row.iter_mut().zip(&self.means) {
            if cell.is_nan() {
                *cell = *mean;
            }
        }
        Ok(())
    }
}
