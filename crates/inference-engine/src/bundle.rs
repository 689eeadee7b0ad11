//! Artifact Bundles
//!
//! A bundle is the model, scaler and (for activity) label encoder of one
//! training run. It is persisted and loaded as a whole; every consistency
//! check happens at load time so a serving request never sees a mixed or
//! stale set.

use crate::InferenceError;
use feature_engine::{
    AirFeatureEngine, FeatureSchema, HealthFeatureConfig, HealthFeatureEngine, ImputationTable,
    TimestampFallback,
};
use preprocessing::{LabelEncoder, StandardScaler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::{ArtifactKind, ArtifactStore, LoadedRun, Manifest, PendingRun};
use tracing::info;
use training::{ActivityRun, AirQualityRun, Classifier, Estimator, TrainedModel};
use uuid::Uuid;

/// Store directory of the AQI regressor
pub const AIR_QUALITY_DOMAIN: &str = "air_quality";
/// Store directory of the activity classifier
pub const HEALTH_DOMAIN: &str = "health";

/// Everything needed to turn a request into a scaled vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub scaler: StandardScaler,
    pub imputation: ImputationTable,
    pub schema: FeatureSchema,
    /// Health engine settings the model was trained with
    pub feature_config: Option<HealthFeatureConfig>,
}

/// Persist a fitted AQI regressor
pub fn persist_air_quality(
    store: &ArtifactStore,
    run: &AirQualityRun,
) -> Result<Manifest, InferenceError> {
    let mut pending = PendingRun::new(AIR_QUALITY_DOMAIN);
    pending.add(ArtifactKind::Model, &run.model)?;
    pending.add(
        ArtifactKind::Scaler,
        &ScalerArtifact {
            scaler: run.scaler.clone(),
            imputation: run.imputation.clone(),
            schema: run.schema.clone(),
            feature_config: None,
        },
    )?;
    Ok(store.save(pending.with_metrics(run.report.headline_metrics()))?)
}

/// Persist a fitted activity classifier
pub fn persist_activity(
    store: &ArtifactStore,
    run: &ActivityRun,
) -> Result<Manifest, InferenceError> {
    let mut pending = PendingRun::new(HEALTH_DOMAIN);
    pending.add(ArtifactKind::Model, &run.model)?;
    pending.add(
        ArtifactKind::Scaler,
        &ScalerArtifact {
            scaler: run.scaler.clone(),
            imputation: run.imputation.clone(),
            schema: run.schema.clone(),
            feature_config: Some(run.feature_config.clone()),
        },
    )?;
    pending.add(ArtifactKind::Encoder, &run.encoder)?;
    Ok(store.save(pending.with_metrics(run.report.headline_metrics()))?)
}

fn unavailable(domain: &str, reason: impl std::fmt::Display) -> InferenceError {
    InferenceError::ModelUnavailable(format!("{} bundle: {}", domain, reason))
}

fn load_run(store: &ArtifactStore, domain: &str) -> Result<LoadedRun, InferenceError> {
    store.load(domain).map_err(|e| unavailable(domain, e))
}

fn decode<T: serde::de::DeserializeOwned>(
    run: &LoadedRun,
    domain: &str,
    kind: ArtifactKind,
) -> Result<T, InferenceError> {
    run.decode(kind).map_err(|e| unavailable(domain, e))
}

/// Shared width and schema checks
fn check_consistency(
    domain: &str,
    expected: &FeatureSchema,
    artifact: &ScalerArtifact,
    model: &TrainedModel,
) -> Result<(), InferenceError> {
    if artifact.schema.columns != expected.columns {
        return Err(unavailable(
            domain,
            format!(
                "stale feature schema (stored {:016x}, current {:016x})",
                artifact.schema.fingerprint(),
                expected.fingerprint()
            ),
        ));
    }
    if artifact.scaler.columns() != expected.columns.as_slice() {
        return Err(unavailable(domain, "scaler columns differ from schema"));
    }
    if artifact.imputation.columns != expected.columns {
        return Err(unavailable(domain, "imputation columns differ from schema"));
    }
    if model.n_features() != artifact.scaler.n_features() {
        return Err(unavailable(
            domain,
            format!(
                "model expects {} features, scaler produces {}",
                model.n_features(),
                artifact.scaler.n_features()
            ),
        ));
    }
    Ok(())
}

/// Immutable AQI regression bundle
#[derive(Debug, Clone)]
pub struct AirQualityBundle {
    pub run_id: Uuid,
    pub model: TrainedModel,
    pub scaler: StandardScaler,
    pub imputation: ImputationTable,
    pub engine: AirFeatureEngine,
    pub metrics: BTreeMap<String, f64>,
}

impl AirQualityBundle {
    /// Build from an in-memory run, applying the load-time checks
    pub fn from_run(run: AirQualityRun) -> Result<Self, InferenceError> {
        let metrics = run.report.headline_metrics();
        let artifact = ScalerArtifact {
            scaler: run.scaler,
            imputation: run.imputation,
            schema: run.schema,
            feature_config: None,
        };
        Self::assemble(Uuid::nil(), run.model, artifact, metrics)
    }

    /// Load the current run from the store
    pub fn load(store: &ArtifactStore) -> Result<Self, InferenceError> {
        let run = load_run(store, AIR_QUALITY_DOMAIN)?;
        let model = decode(&run, AIR_QUALITY_DOMAIN, ArtifactKind::Model)?;
        let artifact = decode(&run, AIR_QUALITY_DOMAIN, ArtifactKind::Scaler)?;
        let bundle = Self::assemble(run.run_id(), model, artifact, run.manifest.metrics.clone())?;
        info!("Loaded air quality bundle from run {}", bundle.run_id);
        Ok(bundle)
    }

    fn assemble(
        run_id: Uuid,
        model: TrainedModel,
        artifact: ScalerArtifact,
        metrics: BTreeMap<String, f64>,
    ) -> Result<Self, InferenceError> {
        let engine = AirFeatureEngine::new();
        check_consistency(AIR_QUALITY_DOMAIN, &engine.schema(), &artifact, &model)?;
        if model.is_classifier() {
            return Err(unavailable(AIR_QUALITY_DOMAIN, "model is not a regressor"));
        }
        Ok(Self {
            run_id,
            model,
            scaler: artifact.scaler,
            imputation: artifact.imputation,
            engine,
            metrics,
        })
    }

    /// Override the time used for requests without a usable timestamp
    pub fn with_timestamp_fallback(mut self, fallback: TimestampFallback) -> Self {
        self.engine = self.engine.with_timestamp_fallback(fallback);
        self
    }
}

/// Immutable activity classification bundle
#[derive(Debug, Clone)]
pub struct ActivityBundle {
    pub run_id: Uuid,
    pub model: TrainedModel,
    pub scaler: StandardScaler,
    pub imputation: ImputationTable,
    pub encoder: LabelEncoder,
    pub engine: HealthFeatureEngine,
    pub metrics: BTreeMap<String, f64>,
}

impl ActivityBundle {
    /// Build from an in-memory run, applying the load-time checks
    pub fn from_run(run: ActivityRun) -> Result<Self, InferenceError> {
        let metrics = run.report.headline_metrics();
        let artifact = ScalerArtifact {
            scaler: run.scaler,
            imputation: run.imputation,
            schema: run.schema,
            feature_config: Some(run.feature_config),
        };
        Self::assemble(Uuid::nil(), run.model, artifact, run.encoder, metrics)
    }

    /// Load the current run from the store
    pub fn load(store: &ArtifactStore) -> Result<Self, InferenceError> {
        let run = load_run(store, HEALTH_DOMAIN)?;
        let model = decode(&run, HEALTH_DOMAIN, ArtifactKind::Model)?;
        let artifact = decode(&run, HEALTH_DOMAIN, ArtifactKind::Scaler)?;
        let encoder = decode(&run, HEALTH_DOMAIN, ArtifactKind::Encoder)?;
        let bundle = Self::assemble(
            run.run_id(),
            model,
            artifact,
            encoder,
            run.manifest.metrics.clone(),
        )?;
        info!(
            "Loaded activity bundle from run {} ({} classes)",
            bundle.run_id,
            bundle.encoder.n_classes()
        );
        Ok(bundle)
    }

    fn assemble(
        run_id: Uuid,
        model: TrainedModel,
        artifact: ScalerArtifact,
        encoder: LabelEncoder,
        metrics: BTreeMap<String, f64>,
    ) -> Result<Self, InferenceError> {
        let engine = HealthFeatureEngine::new(artifact.feature_config.clone().unwrap_or_default());
        check_consistency(HEALTH_DOMAIN, &engine.schema(), &artifact, &model)?;
        if !model.is_classifier() {
            return Err(unavailable(HEALTH_DOMAIN, "model is not a classifier"));
        }
        if model.n_classes() != encoder.n_classes() {
            return Err(unavailable(
                HEALTH_DOMAIN,
                format!(
                    "model has {} classes, encoder {}",
                    model.n_classes(),
                    encoder.n_classes()
                ),
            ));
        }
        Ok(Self {
            run_id,
            model,
            scaler: artifact.scaler,
            imputation: artifact.imputation,
            encoder,
            engine,
            metrics,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dataset::{AirQualityRecord, HealthRecord};
    use std::fs;
    use training::{train_activity, train_air_quality, EstimatorConfig, ForestConfig, TrainingConfig};

    pub(crate) fn quick_config() -> TrainingConfig {
        TrainingConfig {
            estimators: EstimatorConfig {
                air: ForestConfig {
                    n_estimators: 8,
                    ..ForestConfig::default()
                },
                activity: ForestConfig {
                    n_estimators: 8,
                    ..EstimatorConfig::default().activity
                },
                cv_folds: 0,
                ..EstimatorConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    pub(crate) fn health_records() -> Vec<HealthRecord> {
        let activities = ["Resting", "Walking", "Running"];
        (0..60)
            .map(|i| {
                let a = i % 3;
                HealthRecord {
                    record_id: None,
                    athlete_id: format!("A{}", i % 6),
                    timestamp: format!("2024-05-01 09:{:02}:00", i / 6),
                    heart_rate: Some(65.0 + a as f64 * 40.0),
                    step_count: Some(50.0 + a as f64 * 350.0),
                    body_temperature: Some(36.6 + a as f64 * 0.3),
                    blood_oxygen: Some(98.0 - a as f64),
                    latitude: Some(40.4),
                    longitude: Some(-3.7),
                    blood_pressure: "120/80".to_string(),
                    activity_status: activities[a].to_string(),
                }
            })
            .collect()
    }

    pub(crate) fn air_records() -> Vec<AirQualityRecord> {
        (0..50)
            .map(|i| {
                let pm25 = 4.0 * (i % 25) as f64;
                AirQualityRecord {
                    date_time: format!("2024-05-{:02} 12:00:00", 1 + i % 28),
                    station_id: "S1".to_string(),
                    pm25: Some(pm25),
                    pm10: Some(30.0),
                    no2: Some(15.0),
                    so2: Some(4.0),
                    co: Some(0.5),
                    o3: Some(25.0),
                    temp_c: Some(21.0),
                    humidity: Some(50.0),
                    wind_speed: Some(2.0),
                    wind_direction: Some(90.0),
                    pressure: Some(1012.0),
                    rain: Some(0.0),
                    aqi: Some(pm25 * 1.8),
                }
            })
            .collect()
    }

    #[test]
    fn test_persist_and_load_activity_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let run = train_activity(&health_records(), &quick_config()).unwrap();

        let manifest = persist_activity(&store, &run).unwrap();
        let bundle = ActivityBundle::load(&store).unwrap();

        assert_eq!(bundle.run_id, manifest.run_id);
        assert_eq!(bundle.encoder, run.encoder);
        assert_eq!(bundle.scaler, run.scaler);
        assert!(bundle.metrics.contains_key("accuracy"));
    }

    #[test]
    fn test_persist_and_load_air_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let run = train_air_quality(&air_records(), &quick_config()).unwrap();

        persist_air_quality(&store, &run).unwrap();
        let bundle = AirQualityBundle::load(&store).unwrap();
        assert_eq!(bundle.imputation, run.imputation);
    }

    #[test]
    fn test_mixed_run_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("current"));
        let other = ArtifactStore::new(dir.path().join("other"));
        let run = train_activity(&health_records(), &quick_config()).unwrap();

        persist_activity(&store, &run).unwrap();
        persist_activity(&other, &run).unwrap();
        fs::copy(
            other.domain_dir(HEALTH_DOMAIN).join("encoder.bin"),
            store.domain_dir(HEALTH_DOMAIN).join("encoder.bin"),
        )
        .unwrap();

        let err = ActivityBundle::load(&store).unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable(_)));
    }

    #[test]
    fn test_stale_schema_is_unavailable() {
        let mut run = train_activity(&health_records(), &quick_config()).unwrap();
        run.schema.columns.swap(0, 1);
        let err = ActivityBundle::from_run(run).unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable(ref m) if m.contains("schema")));
    }

    #[test]
    fn test_missing_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            AirQualityBundle::load(&store),
            Err(InferenceError::ModelUnavailable(_))
        ));
    }
}
