//! Feature Schema and Table

use crate::FeatureError;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Ordered column names of a feature vector.
///
/// Training and serving must agree on this exactly; the fingerprint is stored
/// with persisted artifacts so a stale bundle is detected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Schema name ("health", "air_quality")
    pub name: String,
    /// Column names in vector order
    pub columns: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema from static column names
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Stable 64-bit FNV-1a hash over the ordered column names
    pub fn fingerprint(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        for column in &self.columns {
            for byte in column.bytes().chain(std::iter::once(0u8)) {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(PRIME);
            }
        }
        hash
    }
}

/// Row-major feature matrix with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    /// Column names in order
    pub columns: Vec<String>,
    /// One row per record
    pub values: Array2<f64>,
}

impl FeatureTable {
    /// Wrap a matrix, checking its width against the column names
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self, FeatureError> {
        if values.ncols() != columns.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: columns.len(),
                actual: values.ncols(),
            });
        }
        Ok(Self { columns, values })
    }

    /// Build a table from row vectors
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, FeatureError> {
        let width = columns.len();
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(FeatureError::ShapeMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((rows.len(), width), flat).map_err(|_| {
            FeatureError::ShapeMismatch {
                expected: width,
                actual: 0,
            }
        })?;
        Ok(Self { columns, values })
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// Position of a column
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// View of one column by name
    pub fn column(&self, column: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(column).map(|idx| self.values.column(idx))
    }

    /// View of one row
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(idx)
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }
}
