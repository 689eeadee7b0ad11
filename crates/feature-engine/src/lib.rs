//! Feature Engineering Engine
//!
//! Turns raw health and air-quality records into fixed-order numeric feature
//! vectors. The same derivation code runs for whole training tables and for
//! single serving requests, so column order and semantics cannot drift apart.

mod air;
mod features;
mod health;
mod imputation;
mod rules;
mod serving;
mod statistics;
mod temporal;

pub use air::{
    AirFeatureEngine, AirQualityReading, EngineeredAir, TimestampFallback, AIR_FEATURE_COLUMNS,
};
pub use features::{FeatureSchema, FeatureTable};
pub use health::{
    EngineeredHealth, HealthFeatureConfig, HealthFeatureEngine, HealthFeatureRow,
    HEALTH_FEATURE_COLUMNS,
};
pub use imputation::ImputationTable;
pub use rules::{Binned, Bins, DecisionTable, OutOfRangePolicy, Rule, RuleInput};
pub use serving::{HealthReading, HistoryPolicy, ServingVector};
pub use statistics::ColumnStatistics;
pub use temporal::{parse_timestamp, RollingMean};

use thiserror::Error;

/// Errors during feature construction
#[derive(Debug, Clone, Error)]
pub enum FeatureError {
    #[error("{column} value {value} is outside the bin edges [{min}, {max}]")]
    OutOfRange {
        column: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Feature shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("No records to engineer")]
    EmptyInput,
}
