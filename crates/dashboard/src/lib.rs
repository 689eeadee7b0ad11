//! Dashboard Aggregates
//!
//! Read-side views for health authorities and citizens computed directly
//! over the loaded raw tables: risk map, alert feeds, statistics and trends.

mod authority;
mod citizen;
mod rules;

pub use authority::{
    AirQualityStats, AlertFeed, AuthorityAlert, DashboardStats, HealthMetrics, RiskMap, RiskPoint,
};
pub use citizen::{MetricTrend, PersonalAlert, PersonalAlerts, TrendMetric, TrendReport, Trends};
pub use rules::{
    classify_aqi, AqiAlertLevel, Condition, DashboardConfig, PersonalAlertRule, Severity, Vital,
};

use dataset::{AirQualityRecord, HealthRecord};
use thiserror::Error;
use tracing::info;

/// Errors for dashboard queries
#[derive(Debug, Clone, Error)]
pub enum DashboardError {
    #[error("Unknown trend metric {0:?}")]
    UnknownMetric(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Raw tables plus the rules applied to them
#[derive(Debug, Clone)]
pub struct Dashboard {
    air: Vec<AirQualityRecord>,
    health: Vec<HealthRecord>,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(
        air: Vec<AirQualityRecord>,
        health: Vec<HealthRecord>,
        config: DashboardConfig,
    ) -> Self {
        info!(
            "Dashboard over {} air quality and {} health rows",
            air.len(),
            health.len()
        );
        Self { air, health, config }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn air_rows(&self) -> usize {
        self.air.len()
    }

    pub fn health_rows(&self) -> usize {
        self.health.len()
    }
}

/// Mean of the present values
pub(crate) fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
