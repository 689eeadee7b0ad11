//! Preprocessing Error Types

use feature_engine::FeatureError;
use thiserror::Error;

/// Errors during splitting, augmentation, scaling or encoding
#[derive(Debug, Clone, Error)]
pub enum PreprocessError {
    /// Vector or table width differs from the fitted width
    #[error("Shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Table columns differ from the fitted column order
    #[error("Column mismatch: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A class is too small to appear on both sides of a stratified split
    #[error("Class {label:?} has {count} member(s); stratification needs at least 2")]
    ClassTooSmall { label: String, count: usize },

    /// Test fraction outside (0, 1) or leaving an empty partition
    #[error("Cannot split {rows} rows with test fraction {fraction}")]
    InvalidSplit { rows: usize, fraction: f64 },

    /// Labels and rows disagree in length
    #[error("Got {labels} labels for {rows} rows")]
    LabelCount { rows: usize, labels: usize },

    /// Label not seen when the encoder was fit
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// Encoded class index outside the fitted classes
    #[error("Class index {0} out of range")]
    UnknownClass(usize),

    /// Fit on an empty table
    #[error("Cannot fit on zero rows")]
    Empty,

    #[error(transparent)]
    Feature(#[from] FeatureError),
}
