//! Training Configuration

use crate::boosting::GradientBoosting;
use crate::estimator::TrainedModel;
use crate::forest::{MaxFeatures, RandomForest};
use crate::tree::DecisionTree;
use feature_engine::HealthFeatureConfig;
use preprocessing::{AugmentationConfig, SplitConfig};
use serde::{Deserialize, Serialize};

/// Learning algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    DecisionTree,
    /// Gradient boosted regression trees
    GradientBoosting,
}

/// Tree ensemble hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
    /// Boosting shrinkage
    pub learning_rate: f64,
    /// Boosting row fraction per round
    pub subsample: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 42,
            learning_rate: 0.1,
            subsample: 1.0,
        }
    }
}

impl ForestConfig {
    /// Unfitted regressor of the requested kind
    pub fn regressor(&self, kind: ModelKind, n_features: usize) -> TrainedModel {
        match kind {
            ModelKind::RandomForest => TrainedModel::Forest(
                self.apply(RandomForest::new_regressor(self.n_estimators)),
            ),
            ModelKind::DecisionTree => {
                TrainedModel::Tree(self.apply_tree(DecisionTree::new_regressor(), n_features))
            }
            ModelKind::GradientBoosting => TrainedModel::Boosted(
                self.apply_boosting(GradientBoosting::new_regressor(self.n_estimators)),
            ),
        }
    }

    /// Unfitted classifier of the requested kind
    pub fn classifier(&self, kind: ModelKind, n_classes: usize, n_features: usize) -> TrainedModel {
        match kind {
            ModelKind::RandomForest => TrainedModel::Forest(
                self.apply(RandomForest::new_classifier(self.n_estimators, n_classes)),
            ),
            ModelKind::DecisionTree => TrainedModel::Tree(
                self.apply_tree(DecisionTree::new_classifier(n_classes), n_features),
            ),
            ModelKind::GradientBoosting => TrainedModel::Boosted(self.apply_boosting(
                GradientBoosting::new_classifier(self.n_estimators, n_classes),
            )),
        }
    }

    fn apply(&self, forest: RandomForest) -> RandomForest {
        forest
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_seed(self.seed)
    }

    fn apply_tree(&self, tree: DecisionTree, n_features: usize) -> DecisionTree {
        let max_features = match self.max_features {
            MaxFeatures::All => None,
            strategy => Some(strategy.resolve(n_features)),
        };
        tree.with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(max_features)
            .with_seed(self.seed)
    }

    fn apply_boosting(&self, boosting: GradientBoosting) -> GradientBoosting {
        boosting
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_learning_rate(self.learning_rate)
            .with_subsample(self.subsample)
            .with_seed(self.seed)
    }
}

/// Per-domain estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub kind: ModelKind,
    /// AQI regressor
    pub air: ForestConfig,
    /// Activity classifier
    pub activity: ForestConfig,
    /// Cross-validation folds (0 or 1 skips CV)
    pub cv_folds: usize,
    /// Importances kept in the report
    pub top_features: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::RandomForest,
            air: ForestConfig::default(),
            activity: ForestConfig {
                n_estimators: 200,
                max_depth: Some(30),
                max_features: MaxFeatures::Sqrt,
                ..ForestConfig::default()
            },
            cv_folds: 5,
            top_features: 10,
        }
    }
}

/// Everything a training run needs besides the data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub split: SplitConfig,
    pub augmentation: AugmentationConfig,
    pub health_features: HealthFeatureConfig,
    pub estimators: EstimatorConfig,
}
