//! Standard Scaling

use crate::error::PreprocessError;
use feature_engine::{ColumnStatistics, FeatureTable};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Z-score scaler: `(x - mean) / std` with population std.
///
/// Fit once on training features and read-only afterwards. Columns with zero
/// std scale by 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and std
    pub fn fit(table: &FeatureTable) -> Result<Self, PreprocessError> {
        if table.n_rows() == 0 {
            return Err(PreprocessError::Empty);
        }

        let (mean, scale): (Vec<f64>, Vec<f64>) = table
            .values
            .columns()
            .into_iter()
            .map(|column| {
                let stats = ColumnStatistics::compute(column.iter());
                let std = stats.std_dev();
                let scale = if std.is_finite() && std > 0.0 { std } else { 1.0 };
                (stats.mean, scale)
            })
            .unzip();

        debug!("Fitted scaler over {} rows", table.n_rows());
        Ok(Self {
            columns: table.columns.clone(),
            mean,
            scale,
        })
    }

    /// Number of columns
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Fitted column order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fitted means
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Fitted scales
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    fn check_table(&self, table: &FeatureTable) -> Result<(), PreprocessError> {
        if table.columns != self.columns {
            return Err(PreprocessError::ColumnMismatch {
                expected: self.columns.clone(),
                actual: table.columns.clone(),
            });
        }
        Ok(())
    }

    /// Scale a table with the same ordered columns
    pub fn transform(&self, table: &FeatureTable) -> Result<Array2<f64>, PreprocessError> {
        self.check_table(table)?;
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((&table.values - &mean.insert_axis(Axis(0))) / &scale.insert_axis(Axis(0)))
    }

    /// Scale a single vector
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, PreprocessError> {
        if row.len() != self.n_features() {
            return Err(PreprocessError::ShapeMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Map scaled values back to feature units
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>, PreprocessError> {
        if scaled.ncols() != self.n_features() {
            return Err(PreprocessError::ShapeMismatch {
                expected: self.n_features(),
                actual: scaled.ncols(),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok(scaled * &scale.insert_axis(Axis(0)) + &mean.insert_axis(Axis(0)))
    }
}
