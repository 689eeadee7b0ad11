//! Citizen Routes

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use dashboard::{PersonalAlerts, TrendReport};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Query parameters for the trends endpoint
#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub user_id: Option<String>,
    /// all, heart_rate, step_count, body_temperature or activity_distribution
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_metric() -> String {
    "all".to_string()
}

fn default_days() -> i64 {
    7
}

/// Get personal health alerts
pub async fn get_personal_alerts(
    State(state): State<Arc<RwLock<AppState>>>,
    params: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<PersonalAlerts>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let state = state.read().await;
    let dashboard = state.dashboard.as_ref().ok_or(ApiError::DataUnavailable)?;
    Ok(Json(dashboard.personal_alerts(params.user_id.as_deref())))
}

/// Get personal health trends
pub async fn get_trends(
    State(state): State<Arc<RwLock<AppState>>>,
    params: Result<Query<TrendQuery>, QueryRejection>,
) -> Result<Json<TrendReport>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let state = state.read().await;
    let dashboard = state.dashboard.as_ref().ok_or(ApiError::DataUnavailable)?;
    let report = dashboard.trends(params.user_id.as_deref(), &params.metric, params.days)?;
    Ok(Json(report))
}
