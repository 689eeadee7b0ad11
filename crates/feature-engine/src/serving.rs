//! Serving-Time Health Vectors
//!
//! A prediction request runs through the same series derivation as training.
//! The request may carry the athlete's preceding readings; without them the
//! reading is the first record of its series and receives the seam values.

use crate::health::{HealthFeatureEngine, Observation};
use crate::imputation::ImputationTable;
use crate::temporal::parse_timestamp;
use crate::FeatureError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One wearable reading as submitted for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReading {
    #[serde(rename = "Heart_Rate")]
    pub heart_rate: f64,
    #[serde(rename = "Body_Temperature")]
    pub body_temperature: f64,
    #[serde(rename = "Blood_Oxygen")]
    pub blood_oxygen: f64,
    #[serde(rename = "Step_Count")]
    pub step_count: f64,
    #[serde(rename = "BP_Systolic")]
    pub bp_systolic: f64,
    #[serde(rename = "BP_Diastolic")]
    pub bp_diastolic: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl HealthReading {
    fn observation(&self) -> Observation {
        let timestamp = parse_timestamp(&self.timestamp).unwrap_or_else(|| {
            warn!(
                "Unparseable reading timestamp {:?}; using current time",
                self.timestamp
            );
            Utc::now().naive_utc()
        });
        Observation {
            timestamp,
            heart_rate: self.heart_rate,
            step_count: self.step_count,
            body_temperature: self.body_temperature,
            blood_oxygen: self.blood_oxygen,
            latitude: self.latitude,
            longitude: self.longitude,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
        }
    }
}

/// How temporal and GPS features of a serving vector were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Derived from readings supplied with the request
    Provided,
    /// No history: first-record seam values
    FirstRecordSeam,
}

/// A single imputed feature vector ready for scaling
#[derive(Debug, Clone, PartialEq)]
pub struct ServingVector {
    pub values: Vec<f64>,
    pub policy: HistoryPolicy,
}

impl HealthFeatureEngine {
    /// Feature vector of `reading`, preceded by the athlete's `history`.
    ///
    /// History readings are ordered by timestamp before the scan; readings
    /// later than the current one do not influence it.
    pub fn serving_vector(
        &self,
        reading: &HealthReading,
        history: &[HealthReading],
        imputation: &ImputationTable,
    ) -> Result<ServingVector, FeatureError> {
        let policy = if history.is_empty() {
            HistoryPolicy::FirstRecordSeam
        } else {
            HistoryPolicy::Provided
        };

        let mut series: Vec<Observation> = history.iter().map(HealthReading::observation).collect();
        let current = series.len();
        series.push(reading.observation());

        let mut order: Vec<usize> = (0..series.len()).collect();
        order.sort_by(|&a, &b| series[a].timestamp.cmp(&series[b].timestamp));
        let position = order
            .iter()
            .position(|&idx| idx == current)
            .unwrap_or(order.len() - 1);
        let ordered: Vec<Observation> = order[..=position]
            .iter()
            .map(|&idx| series[idx].clone())
            .collect();

        let (rows, out_of_range) = self.derive_series(&ordered)?;
        if out_of_range > 0 {
            warn!(
                "Reading has {} values outside bin edges, handled with {:?}",
                out_of_range,
                self.config().out_of_range
            );
        }

        let mut values = rows
            .last()
            .map(|row| row.to_vector())
            .ok_or(FeatureError::EmptyInput)?;
        imputation.apply_row(&mut values)?;

        debug!("Built serving vector with {:?}", policy);
        Ok(ServingVector { values, policy })
    }
}
