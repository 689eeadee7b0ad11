//! Dataset Loading
//!
//! Reads the urban air-pollution and wearable health tables from CSV and
//! draws reproducible subsamples.

mod aqi;
mod loader;
mod records;

pub use aqi::AqiCategory;
pub use loader::{load, read_table, sample_rows, DataConfig};
pub use records::{AirQualityRecord, HealthRecord, TabularRecord};

use thiserror::Error;

/// Errors while loading a table
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset {path} is unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{dataset} table is missing required columns: {missing:?}")]
    MissingColumns {
        dataset: &'static str,
        missing: Vec<String>,
    },
    #[error("Malformed {dataset} row {row}: {reason}")]
    Malformed {
        dataset: &'static str,
        row: usize,
        reason: String,
    },
}
