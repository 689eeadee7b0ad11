//! Health Authority Routes

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use dashboard::{AlertFeed, DashboardStats, RiskMap};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{ApiError, AppState};

/// Query parameters for the alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by severity (Low, Medium, High)
    pub severity: Option<String>,
    /// Readings examined before the severity filter
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Get the station risk map
pub async fn get_risk_map(
    State(state): State<Arc<RwLock<AppState>>>,
) -> Result<Json<RiskMap>, ApiError> {
    let state = state.read().await;
    let dashboard = state.dashboard.as_ref().ok_or(ApiError::DataUnavailable)?;
    Ok(Json(dashboard.risk_map()))
}

/// Get air quality alerts
pub async fn get_alerts(
    State(state): State<Arc<RwLock<AppState>>>,
    params: Result<Query<AlertQuery>, QueryRejection>,
) -> Result<Json<AlertFeed>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let state = state.read().await;
    let dashboard = state.dashboard.as_ref().ok_or(ApiError::DataUnavailable)?;
    Ok(Json(
        dashboard.authority_alerts(params.severity.as_deref(), params.limit),
    ))
}

/// Get dashboard statistics
pub async fn get_stats(
    State(state): State<Arc<RwLock<AppState>>>,
) -> Result<Json<DashboardStats>, ApiError> {
    let state = state.read().await;
    let dashboard = state.dashboard.as_ref().ok_or(ApiError::DataUnavailable)?;
    Ok(Json(dashboard.stats()))
}
