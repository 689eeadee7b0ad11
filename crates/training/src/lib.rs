//! Model Training and Evaluation
//!
//! Estimators sit behind the `Estimator` / `Classifier` traits so the
//! pipelines, cross-validation and serving never depend on a concrete
//! learning algorithm.

mod boosting;
mod config;
mod cross_validation;
mod estimator;
mod forest;
mod metrics;
mod pipeline;
mod tree;

pub use boosting::GradientBoosting;
pub use config::{EstimatorConfig, ForestConfig, ModelKind, TrainingConfig};
pub use cross_validation::{cross_val_score, CvScores, Fold, KFold, Scoring, StratifiedKFold};
pub use estimator::{Classifier, Estimator, TrainedModel};
pub use forest::{MaxFeatures, RandomForest};
pub use metrics::{
    accuracy, mean_squared_error, r2_score, root_mean_squared_error, ClassMetrics,
    ClassificationReport, RegressionMetrics,
};
pub use pipeline::{
    top_features, train_activity, train_air_quality, ActivityRun, AirQualityRun, Holdout,
    TrainingReport,
};
pub use tree::{DecisionTree, Task, TreeNode};

use feature_engine::FeatureError;
use preprocessing::PreprocessError;
use thiserror::Error;

/// Errors during training and evaluation
#[derive(Debug, Clone, Error)]
pub enum TrainingError {
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("No training samples")]
    EmptyInput,

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Label {0} is not a class index")]
    InvalidLabel(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation requires a classifier")]
    NotAClassifier,

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
}
