//! End-to-End Training Pipelines
//!
//! Both pipelines run feature engineering, the leakage-safe split /
//! augmentation / scaling stage, optional cross-validation on the training
//! partition, a final fit, and held-out evaluation on the untouched test rows.

use crate::config::TrainingConfig;
use crate::cross_validation::{cross_val_score, CvScores, KFold, Scoring, StratifiedKFold};
use crate::estimator::{Estimator, TrainedModel};
use crate::metrics::{ClassificationReport, RegressionMetrics};
use crate::tree::class_indices;
use crate::TrainingError;
use dataset::{AirQualityRecord, HealthRecord};
use feature_engine::{
    AirFeatureEngine, FeatureSchema, HealthFeatureConfig, HealthFeatureEngine, ImputationTable,
};
use ndarray::Array1;
use preprocessing::{
    prepare_classification, prepare_regression, LabelEncoder, Prepared, StandardScaler,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Held-out evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Holdout {
    Regression(RegressionMetrics),
    Classification(ClassificationReport),
}

/// Summary of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// "air_quality" or "health"
    pub domain: String,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Training rows after augmentation
    pub augmented_train_rows: usize,
    /// Absent when cross-validation is disabled
    pub cv: Option<CvScores>,
    pub holdout: Holdout,
    /// (column, importance), most important first
    pub top_features: Vec<(String, f64)>,
}

impl TrainingReport {
    /// Flat metric map stored in the artifact manifest
    pub fn headline_metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("train_rows".to_string(), self.train_rows as f64);
        metrics.insert("test_rows".to_string(), self.test_rows as f64);
        metrics.insert(
            "augmented_train_rows".to_string(),
            self.augmented_train_rows as f64,
        );
        if let Some(cv) = &self.cv {
            metrics.insert("cv_mean".to_string(), cv.mean);
            metrics.insert("cv_std".to_string(), cv.std);
        }
        match &self.holdout {
            Holdout::Regression(m) => {
                metrics.insert("mse".to_string(), m.mse);
                metrics.insert("rmse".to_string(), m.rmse);
                metrics.insert("r2".to_string(), m.r2);
            }
            Holdout::Classification(report) => {
                metrics.insert("accuracy".to_string(), report.accuracy);
                metrics.insert("macro_f1".to_string(), report.macro_f1);
                metrics.insert("weighted_f1".to_string(), report.weighted_f1);
            }
        }
        metrics
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.domain)?;
        writeln!(
            f,
            "train rows: {} ({} after augmentation), test rows: {}",
            self.train_rows, self.augmented_train_rows, self.test_rows
        )?;
        if let Some(cv) = &self.cv {
            writeln!(
                f,
                "cv {:?}: {:.4} ± {:.4} over {} folds",
                cv.scoring,
                cv.mean,
                cv.std,
                cv.scores.len()
            )?;
        }
        match &self.holdout {
            Holdout::Regression(m) => writeln!(f, "{}", m)?,
            Holdout::Classification(report) => writeln!(f, "{}", report)?,
        }
        writeln!(f, "top features:")?;
        for (column, importance) in &self.top_features {
            writeln!(f, "  {:<28} {:.4}", column, importance)?;
        }
        Ok(())
    }
}

/// Fitted air quality regressor and everything needed to serve it
#[derive(Debug, Clone)]
pub struct AirQualityRun {
    pub model: TrainedModel,
    pub scaler: StandardScaler,
    pub imputation: ImputationTable,
    pub schema: FeatureSchema,
    pub report: TrainingReport,
}

/// Fitted activity classifier and everything needed to serve it
#[derive(Debug, Clone)]
pub struct ActivityRun {
    pub model: TrainedModel,
    pub scaler: StandardScaler,
    pub imputation: ImputationTable,
    pub encoder: LabelEncoder,
    pub schema: FeatureSchema,
    pub feature_config: HealthFeatureConfig,
    pub report: TrainingReport,
}

/// The `n` most important columns, ties broken by column order
pub fn top_features(importances: &[f64], columns: &[String], n: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(usize, f64)> = importances.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(n)
        .filter_map(|(idx, importance)| columns.get(idx).map(|c| (c.clone(), importance)))
        .collect()
}

fn float_labels(labels: &[usize]) -> Array1<f64> {
    labels.iter().map(|&l| l as f64).collect()
}

/// Train the AQI regressor on engineered air quality records
pub fn train_air_quality(
    records: &[AirQualityRecord],
    config: &TrainingConfig,
) -> Result<AirQualityRun, TrainingError> {
    let engine = AirFeatureEngine::new();
    let engineered = engine.engineer(records)?;
    let schema = engine.schema();
    let prepared = prepare_regression(&engineered.features, &engineered.targets, &config.split)?;

    let estimators = &config.estimators;
    let mut model = estimators.air.regressor(estimators.kind, schema.len());
    let y_train = Array1::from_vec(prepared.y_train.clone());

    let cv = if estimators.cv_folds >= 2 {
        let folds =
            KFold::new(estimators.cv_folds, config.split.seed).split(prepared.x_train.nrows())?;
        let scores = cross_val_score(&model, &prepared.x_train, &y_train, &folds, Scoring::R2)?;
        info!("Air quality CV R²: {:.4} ± {:.4}", scores.mean, scores.std);
        Some(scores)
    } else {
        None
    };

    model.fit(&prepared.x_train, &y_train)?;
    let predicted = model.predict(&prepared.x_test)?;
    let holdout = RegressionMetrics::compute(&prepared.y_test, &predicted.to_vec());
    info!(
        "Air quality holdout: RMSE {:.4}, R² {:.4}",
        holdout.rmse, holdout.r2
    );

    let report = build_report(
        "air_quality",
        &prepared,
        cv,
        Holdout::Regression(holdout),
        &model,
        &schema,
        estimators.top_features,
    );

    Ok(AirQualityRun {
        model,
        scaler: prepared.scaler,
        imputation: engineered.imputation,
        schema,
        report,
    })
}

/// Train the activity classifier on engineered wearable records
pub fn train_activity(
    records: &[HealthRecord],
    config: &TrainingConfig,
) -> Result<ActivityRun, TrainingError> {
    let engine = HealthFeatureEngine::new(config.health_features.clone());
    let engineered = engine.engineer(records)?;
    let schema = engine.schema();

    let encoder = LabelEncoder::fit(&engineered.labels)?;
    let labels = encoder.transform(&engineered.labels)?;
    info!("Activity classes: {:?}", encoder.classes());

    let prepared = prepare_classification(
        &engineered.features,
        &labels,
        &config.split,
        &config.augmentation,
    )?;

    let estimators = &config.estimators;
    let mut model = estimators
        .activity
        .classifier(estimators.kind, encoder.n_classes(), schema.len());
    let y_train = float_labels(&prepared.y_train);

    let cv = if estimators.cv_folds >= 2 {
        let folds = StratifiedKFold::new(estimators.cv_folds, config.split.seed)
            .split(&prepared.y_train)?;
        let scores =
            cross_val_score(&model, &prepared.x_train, &y_train, &folds, Scoring::Accuracy)?;
        info!("Activity CV accuracy: {:.4} ± {:.4}", scores.mean, scores.std);
        Some(scores)
    } else {
        None
    };

    model.fit(&prepared.x_train, &y_train)?;
    let predicted = class_indices(&model.predict(&prepared.x_test)?)?;
    let holdout = ClassificationReport::compute(&prepared.y_test, &predicted, encoder.classes());
    info!("Activity holdout accuracy: {:.4}", holdout.accuracy);

    let report = build_report(
        "health",
        &prepared,
        cv,
        Holdout::Classification(holdout),
        &model,
        &schema,
        estimators.top_features,
    );

    Ok(ActivityRun {
        model,
        scaler: prepared.scaler,
        imputation: engineered.imputation,
        encoder,
        schema,
        feature_config: config.health_features.clone(),
        report,
    })
}

fn build_report<T>(
    domain: &str,
    prepared: &Prepared<T>,
    cv: Option<CvScores>,
    holdout: Holdout,
    model: &TrainedModel,
    schema: &FeatureSchema,
    n_top: usize,
) -> TrainingReport {
    TrainingReport {
        domain: domain.to_string(),
        train_rows: prepared.original_train_rows,
        test_rows: prepared.x_test.nrows(),
        augmented_train_rows: prepared.x_train.nrows(),
        cv,
        holdout,
        top_features: top_features(model.feature_importances(), &schema.columns, n_top),
    }
}
