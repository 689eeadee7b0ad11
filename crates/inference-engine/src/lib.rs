//! Inference Engine
//!
//! Loads the model / scaler / encoder bundle of a training run as one
//! immutable unit and turns single serving requests into predictions.

mod bundle;
mod engine;

pub use bundle::{
    persist_activity, persist_air_quality, ActivityBundle, AirQualityBundle, ScalerArtifact,
    AIR_QUALITY_DOMAIN, HEALTH_DOMAIN,
};
pub use engine::{ActivityPrediction, ActivityPredictor, AirQualityPrediction, AirQualityPredictor};

use feature_engine::FeatureError;
use preprocessing::PreprocessError;
use storage::StorageError;
use thiserror::Error;
use training::TrainingError;

/// Errors during bundle loading and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Feature vector has {actual} values, model expects {expected}")]
    FeatureShapeMismatch { expected: usize, actual: usize },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<FeatureError> for InferenceError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::ShapeMismatch { expected, actual } => {
                InferenceError::FeatureShapeMismatch { expected, actual }
            }
            other => InferenceError::InvalidInput(other.to_string()),
        }
    }
}

impl From<PreprocessError> for InferenceError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::ShapeMismatch { expected, actual } => {
                InferenceError::FeatureShapeMismatch { expected, actual }
            }
            PreprocessError::Feature(inner) => inner.into(),
            other => InferenceError::PredictionFailed(other.to_string()),
        }
    }
}

impl From<TrainingError> for InferenceError {
    fn from(e: TrainingError) -> Self {
        match e {
            TrainingError::ShapeMismatch { expected, actual } => {
                InferenceError::FeatureShapeMismatch { expected, actual }
            }
            other => InferenceError::PredictionFailed(other.to_string()),
        }
    }
}
