//! Air Quality Feature Engineering

use crate::features::{FeatureSchema, FeatureTable};
use crate::imputation::ImputationTable;
use crate::temporal::parse_timestamp;
use crate::FeatureError;
use chrono::{Datelike, NaiveDateTime, Timelike, Utc};
use dataset::AirQualityRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Air quality feature vector column order
pub const AIR_FEATURE_COLUMNS: [&str; 15] = [
    "PM2.5",
    "PM10",
    "NO₂",
    "SO₂",
    "CO",
    "O₃",
    "Temp_C",
    "Humidity_%",
    "Wind_Speed_mps",
    "Wind_Direction_deg",
    "Pressure_hPa",
    "Rain_mm",
    "Hour",
    "DayOfWeek",
    "Month",
];

/// Pollutant and weather inputs submitted for an AQI prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    #[serde(rename = "PM25")]
    pub pm25: f64,
    #[serde(rename = "PM10")]
    pub pm10: f64,
    #[serde(rename = "NO2")]
    pub no2: f64,
    #[serde(rename = "SO2")]
    pub so2: f64,
    #[serde(rename = "CO")]
    pub co: f64,
    #[serde(rename = "O3")]
    pub o3: f64,
    #[serde(rename = "Temp_C")]
    pub temp_c: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "Wind_Speed")]
    pub wind_speed: f64,
    #[serde(rename = "Wind_Direction")]
    pub wind_direction: f64,
    #[serde(rename = "Pressure")]
    pub pressure: f64,
    #[serde(rename = "Rain")]
    pub rain: f64,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<String>,
}

impl AirQualityReading {
    fn inputs(&self) -> [f64; 12] {
        [
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.o3,
            self.temp_c,
            self.humidity,
            self.wind_speed,
            self.wind_direction,
            self.pressure,
            self.rain,
        ]
    }
}

/// Temporal features of a serving request without a usable timestamp.
///
/// `Impute` treats them exactly as an unparseable training `DateTime`: missing,
/// then filled with the fitted means. `Now` and `Fixed` substitute an instant
/// instead, so such requests no longer match the training derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFallback {
    /// Missing, filled by the imputation means
    #[default]
    Impute,
    /// Current wall-clock time (UTC)
    Now,
    /// A fixed instant
    Fixed(NaiveDateTime),
}

impl TimestampFallback {
    fn resolve(&self) -> Option<NaiveDateTime> {
        match self {
            TimestampFallback::Impute => None,
            TimestampFallback::Now => Some(Utc::now().naive_utc()),
            TimestampFallback::Fixed(at) => Some(*at),
        }
    }
}

/// Output of the air quality feature pipeline
#[derive(Debug, Clone)]
pub struct EngineeredAir {
    /// Imputed feature table in `AIR_FEATURE_COLUMNS` order
    pub features: FeatureTable,
    /// AQI_Target per row
    pub targets: Vec<f64>,
    /// Index of each row in the input records
    pub source_rows: Vec<usize>,
    /// Means used to fill missing values
    pub imputation: ImputationTable,
}

/// Air quality feature engine
#[derive(Debug, Clone, Default)]
pub struct AirFeatureEngine {
    fallback: TimestampFallback,
}

fn temporal_features(at: Option<NaiveDateTime>) -> [f64; 3] {
    match at {
        Some(at) => [
            at.hour() as f64,
            at.weekday().num_days_from_monday() as f64,
            at.month() as f64,
        ],
        None => [f64::NAN; 3],
    }
}

impl AirFeatureEngine {
    /// Create an engine that imputes missing serving timestamps
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the serving timestamp fallback
    pub fn with_timestamp_fallback(mut self, fallback: TimestampFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Schema of the produced vectors
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new("air_quality", &AIR_FEATURE_COLUMNS)
    }

    /// Engineer a training table, fitting imputation means over it
    pub fn engineer(&self, records: &[AirQualityRecord]) -> Result<EngineeredAir, FeatureError> {
        self.run(records, None)
    }

    /// Engineer a table using previously fitted imputation means
    pub fn engineer_with(
        &self,
        records: &[AirQualityRecord],
        imputation: &ImputationTable,
    ) -> Result<EngineeredAir, FeatureError> {
        self.run(records, Some(imputation))
    }

    fn run(
        &self,
        records: &[AirQualityRecord],
        imputation: Option<&ImputationTable>,
    ) -> Result<EngineeredAir, FeatureError> {
        let mut rows = Vec::with_capacity(records.len());
        let mut targets = Vec::with_capacity(records.len());
        let mut source_rows = Vec::with_capacity(records.len());
        let mut unparsed = 0usize;

        for (idx, record) in records.iter().enumerate() {
            let Some(target) = record.aqi else {
                continue;
            };

            let at = parse_timestamp(&record.date_time);
            if at.is_none() {
                unparsed += 1;
            }

            let mut row: Vec<f64> = record
                .inputs()
                .iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            row.extend_from_slice(&temporal_features(at));

            rows.push(row);
            targets.push(target);
            source_rows.push(idx);
        }

        let dropped = records.len() - rows.len();
        if dropped > 0 {
            warn!("Dropped {} air quality rows without AQI_Target", dropped);
        }
        if unparsed > 0 {
            warn!(
                "{} air quality timestamps could not be parsed; temporal features imputed",
                unparsed
            );
        }
        if rows.is_empty() {
            return Err(FeatureError::EmptyInput);
        }

        let columns = AIR_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut features = FeatureTable::from_rows(columns, &rows)?;
        let imputation = match imputation {
            Some(table) => table.clone(),
            None => ImputationTable::fit(&features),
        };
        imputation.apply(&mut features)?;

        info!(
            "Engineered {} air quality rows x {} features",
            features.n_rows(),
            features.n_cols()
        );

        Ok(EngineeredAir {
            features,
            targets,
            source_rows,
            imputation,
        })
    }

    /// Feature vector of a single serving request
    pub fn serving_vector(
        &self,
        reading: &AirQualityReading,
        imputation: &ImputationTable,
    ) -> Result<Vec<f64>, FeatureError> {
        let at = reading
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.fallback.resolve());

        let mut values = reading.inputs().to_vec();
        values.extend_from_slice(&temporal_features(at));
        imputation.apply_row(&mut values)?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date_time: &str, pm25: Option<f64>, aqi: Option<f64>) -> AirQualityRecord {
        AirQualityRecord {
            date_time: date_time.to_string(),
            station_id: "S1".to_string(),
            pm25,
            pm10: Some(40.0),
            no2: Some(20.0),
            so2: Some(5.0),
            co: Some(0.8),
            o3: Some(30.0),
            temp_c: Some(18.0),
            humidity: Some(60.0),
            wind_speed: Some(2.5),
            wind_direction: Some(180.0),
            pressure: Some(1012.0),
            rain: Some(0.0),
            aqi,
        }
    }

    fn reading(timestamp: Option<&str>) -> AirQualityReading {
        AirQualityReading {
            pm25: 12.0,
            pm10: 40.0,
            no2: 20.0,
            so2: 5.0,
            co: 0.8,
            o3: 30.0,
            temp_c: 18.0,
            humidity: 60.0,
            wind_speed: 2.5,
            wind_direction: 180.0,
            pressure: 1012.0,
            rain: 0.0,
            timestamp: timestamp.map(str::to_string),
        }
    }

    #[test]
    fn test_temporal_columns() {
        // 2024-03-04 is a Monday
        let records = vec![
            record("2024-03-04 07:00:00", Some(10.0), Some(42.0)),
            record("2024-03-10 23:00:00", Some(20.0), Some(80.0)),
        ];
        let engineered = AirFeatureEngine::new().engineer(&records).unwrap();
        assert_eq!(engineered.features.n_cols(), 15);
        assert_eq!(engineered.features.column("Hour").unwrap().to_vec(), vec![7.0, 23.0]);
        assert_eq!(engineered.features.column("DayOfWeek").unwrap().to_vec(), vec![0.0, 6.0]);
        assert_eq!(engineered.features.column("Month").unwrap().to_vec(), vec![3.0, 3.0]);
        assert_eq!(engineered.targets, vec![42.0, 80.0]);
    }

    #[test]
    fn test_missing_target_dropped_and_inputs_imputed() {
        let records = vec![
            record("2024-03-04 07:00:00", Some(10.0), Some(42.0)),
            record("2024-03-04 08:00:00", Some(99.0), None),
            record("2024-03-04 09:00:00", None, Some(50.0)),
            record("2024-03-04 10:00:00", Some(30.0), Some(60.0)),
        ];
        let engineered = AirFeatureEngine::new().engineer(&records).unwrap();
        assert_eq!(engineered.source_rows, vec![0, 2, 3]);
        assert_eq!(
            engineered.features.column("PM2.5").unwrap().to_vec(),
            vec![10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn test_all_targets_missing() {
        let records = vec![record("2024-03-04 07:00:00", Some(10.0), None)];
        let err = AirFeatureEngine::new().engineer(&records).unwrap_err();
        assert!(matches!(err, FeatureError::EmptyInput));
    }

    #[test]
    fn test_serving_vector_matches_training_row() {
        let engine = AirFeatureEngine::new();
        let records = vec![record("2024-03-04 07:00:00", Some(12.0), Some(42.0))];
        let engineered = engine.engineer(&records).unwrap();

        let served = engine
            .serving_vector(&reading(Some("2024-03-04 07:00:00")), &engineered.imputation)
            .unwrap();
        assert_eq!(served, engineered.features.row(0).to_vec());
    }

    #[test]
    fn test_unparseable_timestamp_matches_training_row() {
        let engine = AirFeatureEngine::new();
        let records = vec![
            record("2024-03-04 07:00:00", Some(12.0), Some(42.0)),
            record("2024-03-10 23:00:00", Some(20.0), Some(80.0)),
            record("not a date", Some(12.0), Some(50.0)),
        ];
        let engineered = engine.engineer(&records).unwrap();
        let trained = engineered.features.row(2).to_vec();
        assert_eq!(&trained[12..], &[15.0, 3.0, 3.0]);

        for timestamp in [None, Some("not a date")] {
            let served = engine
                .serving_vector(&reading(timestamp), &engineered.imputation)
                .unwrap();
            assert_eq!(served, trained);
        }
    }

    #[test]
    fn test_serving_timestamp_fallback() {
        let fixed = parse_timestamp("2024-12-25 18:30:00").unwrap();
        let engine = AirFeatureEngine::new().with_timestamp_fallback(TimestampFallback::Fixed(fixed));
        let records = vec![record("2024-03-04 07:00:00", Some(12.0), Some(42.0))];
        let imputation = engine.engineer(&records).unwrap().imputation;

        for timestamp in [None, Some("garbage")] {
            let served = engine.serving_vector(&reading(timestamp), &imputation).unwrap();
            assert_eq!(&served[12..], &[18.0, 2.0, 12.0]);
        }
    }
}
