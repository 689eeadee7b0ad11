//! HTTP Error Mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dashboard::DashboardError;
use inference_engine::InferenceError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Data not available")]
    DataUnavailable,
    #[error("Model not available: {0}")]
    ModelUnavailable(String),
    #[error("Feature shape mismatch: expected {expected}, got {actual}")]
    FeatureShapeMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DataUnavailable | ApiError::ModelUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::FeatureShapeMismatch { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelUnavailable(reason) => ApiError::ModelUnavailable(reason),
            InferenceError::FeatureShapeMismatch { expected, actual } => {
                ApiError::FeatureShapeMismatch { expected, actual }
            }
            InferenceError::InvalidInput(reason) => ApiError::InvalidInput(reason),
            other => ApiError::Internal(format!("Error during prediction: {}", other)),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} ({})", self, status);
        } else {
            warn!("{} ({})", self, status);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
