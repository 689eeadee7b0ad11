//! Inference Engine Implementation

use crate::bundle::{ActivityBundle, AirQualityBundle};
use crate::InferenceError;
use dataset::AqiCategory;
use feature_engine::{AirQualityReading, HealthReading, HistoryPolicy};
use ndarray::Array2;
use preprocessing::StandardScaler;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use training::{Classifier, Estimator};

/// AQI prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityPrediction {
    pub predicted_aqi: f64,
    pub category: String,
    pub health_concern: String,
}

/// Activity prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPrediction {
    pub predicted_activity: String,
    /// Probability of the predicted class
    pub confidence: f64,
    /// Probability per activity label
    pub probabilities: BTreeMap<String, f64>,
    pub history_policy: HistoryPolicy,
}

fn scaled_row(scaler: &StandardScaler, values: &[f64]) -> Result<Array2<f64>, InferenceError> {
    let scaled = scaler.transform_row(values)?;
    let width = scaled.len();
    Array2::from_shape_vec((1, width), scaled)
        .map_err(|e| InferenceError::PredictionFailed(e.to_string()))
}

/// Serves AQI predictions from a loaded bundle
#[derive(Debug, Clone)]
pub struct AirQualityPredictor {
    bundle: Arc<AirQualityBundle>,
}

impl AirQualityPredictor {
    pub fn new(bundle: AirQualityBundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &AirQualityBundle {
        &self.bundle
    }

    /// Predict the AQI of one reading
    pub fn predict(&self, reading: &AirQualityReading) -> Result<AirQualityPrediction, InferenceError> {
        let start = Instant::now();
        let bundle = &self.bundle;

        let vector = bundle.engine.serving_vector(reading, &bundle.imputation)?;
        let x = scaled_row(&bundle.scaler, &vector)?;
        let predicted = bundle.model.predict(&x)?;
        let predicted_aqi = predicted
            .first()
            .copied()
            .ok_or_else(|| InferenceError::PredictionFailed("empty prediction".to_string()))?;
        let category = AqiCategory::from_aqi(predicted_aqi);

        debug!(
            "AQI prediction {:.2} ({}) in {}us",
            predicted_aqi,
            category.as_str(),
            start.elapsed().as_micros()
        );
        Ok(AirQualityPrediction {
            predicted_aqi,
            category: category.as_str().to_string(),
            health_concern: category.health_concern().to_string(),
        })
    }
}

/// Serves activity predictions from a loaded bundle
#[derive(Debug, Clone)]
pub struct ActivityPredictor {
    bundle: Arc<ActivityBundle>,
}

impl ActivityPredictor {
    pub fn new(bundle: ActivityBundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &ActivityBundle {
        &self.bundle
    }

    /// Classify one reading; `history` holds the athlete's earlier readings, if any
    pub fn predict(
        &self,
        reading: &HealthReading,
        history: &[HealthReading],
    ) -> Result<ActivityPrediction, InferenceError> {
        let start = Instant::now();
        let bundle = &self.bundle;

        let vector = bundle
            .engine
            .serving_vector(reading, history, &bundle.imputation)?;
        let x = scaled_row(&bundle.scaler, &vector.values)?;
        let proba = bundle.model.predict_proba(&x)?;
        let row = proba.row(0);

        // Lowest class index wins a tie
        let (best, confidence) = row
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bp), (i, &p)| {
                if p > bp {
                    (i, p)
                } else {
                    (bi, bp)
                }
            });

        let mut probabilities = BTreeMap::new();
        for (class, &p) in row.iter().enumerate() {
            let label = bundle
                .encoder
                .decode(class)
                .map_err(|e| InferenceError::PredictionFailed(e.to_string()))?;
            probabilities.insert(label.to_string(), p);
        }
        let predicted_activity = bundle
            .encoder
            .decode(best)
            .map_err(|e| InferenceError::PredictionFailed(e.to_string()))?
            .to_string();

        debug!(
            "Activity prediction {} ({:.2}, {:?}) in {}us",
            predicted_activity,
            confidence,
            vector.policy,
            start.elapsed().as_micros()
        );
        Ok(ActivityPrediction {
            predicted_activity,
            confidence,
            probabilities,
            history_policy: vector.policy,
        })
    }
}
