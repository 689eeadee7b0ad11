//! Estimator Contracts

use crate::boosting::GradientBoosting;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;
use crate::TrainingError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fit/predict contract shared by every learning algorithm
pub trait Estimator: Send + Sync {
    /// Fit on rows of `x` with targets `y` (class indices for classifiers)
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), TrainingError>;

    /// Predict one value per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, TrainingError>;

    /// Width of the vectors the estimator was fit on
    fn n_features(&self) -> usize;
}

/// Estimators that also produce class probabilities
pub trait Classifier: Estimator {
    /// One row of class probabilities per input row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError>;

    /// Number of classes
    fn n_classes(&self) -> usize;
}

/// A fitted model as persisted and served
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Forest(RandomForest),
    Tree(DecisionTree),
    Boosted(GradientBoosting),
}

impl TrainedModel {
    /// Normalized impurity-based feature importances
    pub fn feature_importances(&self) -> &[f64] {
        match self {
            TrainedModel::Forest(forest) => forest.feature_importances(),
            TrainedModel::Tree(tree) => tree.feature_importances(),
            TrainedModel::Boosted(boosted) => boosted.feature_importances(),
        }
    }

    /// Whether the model predicts classes
    pub fn is_classifier(&self) -> bool {
        let task = match self {
            TrainedModel::Forest(forest) => forest.task,
            TrainedModel::Tree(tree) => tree.task,
            TrainedModel::Boosted(boosted) => boosted.task,
        };
        task.is_classification()
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::Forest(forest) => forest,
            TrainedModel::Tree(tree) => tree,
            TrainedModel::Boosted(boosted) => boosted,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::Forest(forest) => forest,
            TrainedModel::Tree(tree) => tree,
            TrainedModel::Boosted(boosted) => boosted,
        }
    }
}

impl Estimator for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), TrainingError> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, TrainingError> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }
}

impl Classifier for TrainedModel {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        self.inner().predict_proba(x)
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }
}
