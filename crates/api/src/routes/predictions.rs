//! Prediction Routes

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use feature_engine::{AirQualityReading, HealthReading};
use inference_engine::{ActivityPrediction, AirQualityPrediction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::{ApiError, AppState};

/// Activity request: the reading plus the athlete's earlier readings, oldest first
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRequest {
    #[serde(flatten)]
    pub reading: HealthReading,
    #[serde(rename = "History", default)]
    pub history: Vec<HealthReading>,
}

/// Successful prediction with the run that produced it
#[derive(Debug, Serialize)]
pub struct PredictionResponse<T> {
    pub status: &'static str,
    #[serde(flatten)]
    pub prediction: T,
    pub run_id: String,
    pub timestamp: String,
}

impl<T> PredictionResponse<T> {
    fn success(prediction: T, run_id: String) -> Self {
        Self {
            status: "success",
            prediction,
            run_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn record(domain: &'static str, start: Instant, ok: bool) {
    let outcome = if ok { "success" } else { "error" };
    metrics::counter!("predictions_total", "domain" => domain, "outcome" => outcome).increment(1);
    metrics::histogram!("prediction_duration_seconds", "domain" => domain)
        .record(start.elapsed().as_secs_f64());
}

/// Predict the AQI of one set of pollutant and weather readings
pub async fn predict_air_quality(
    State(state): State<Arc<RwLock<AppState>>>,
    body: Result<Json<AirQualityReading>, JsonRejection>,
) -> Result<Json<PredictionResponse<AirQualityPrediction>>, ApiError> {
    let Json(reading) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let predictor = state
        .read()
        .await
        .air_quality
        .clone()
        .ok_or_else(|| ApiError::ModelUnavailable("air quality model not loaded".to_string()))?;

    let start = Instant::now();
    let result = predictor.predict(&reading);
    record("air_quality", start, result.is_ok());

    Ok(Json(PredictionResponse::success(
        result?,
        predictor.bundle().run_id.to_string(),
    )))
}

/// Classify the activity of one wearable reading
pub async fn predict_activity(
    State(state): State<Arc<RwLock<AppState>>>,
    body: Result<Json<ActivityRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse<ActivityPrediction>>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let predictor = state
        .read()
        .await
        .activity
        .clone()
        .ok_or_else(|| ApiError::ModelUnavailable("activity model not loaded".to_string()))?;

    let start = Instant::now();
    let result = predictor.predict(&request.reading, &request.history);
    record("activity", start, result.is_ok());

    Ok(Json(PredictionResponse::success(
        result?,
        predictor.bundle().run_id.to_string(),
    )))
}
