//! Random Forest

use crate::estimator::{Classifier, Estimator};
use crate::tree::{argmax, class_indices, DecisionTree, Task};
use crate::TrainingError;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for features drawn per node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub(crate) fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged ensemble of decision trees.
///
/// Tree `i` draws its bootstrap sample and feature seed from
/// `seed + i`, so the fitted forest does not depend on how rayon schedules
/// the trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Prediction task
    pub task: Task,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per node
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed
    pub seed: u64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    fn with_task(task: Task, n_estimators: usize, max_features: MaxFeatures) -> Self {
        Self {
            trees: Vec::new(),
            task,
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
            bootstrap: true,
            seed: 42,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Create a classifier forest; `n_classes = 0` infers it from the labels
    pub fn new_classifier(n_estimators: usize, n_classes: usize) -> Self {
        Self::with_task(
            Task::Classification { n_classes },
            n_estimators,
            MaxFeatures::Sqrt,
        )
    }

    /// Create a regressor forest
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::with_task(Task::Regression, n_estimators, MaxFeatures::All)
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set base seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fitted trees
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of the per-tree importances, normalized
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn fit_tree(
        &self,
        idx: usize,
        x: &Array2<f64>,
        y: &Array1<f64>,
        max_features: usize,
    ) -> Result<DecisionTree, TrainingError> {
        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(idx as u64));

        let sample_indices: Vec<usize> = if self.bootstrap {
            (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
        } else {
            (0..n_samples).collect()
        };
        let x_boot = x.select(Axis(0), &sample_indices);
        let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

        let mut tree = match self.task {
            Task::Classification { n_classes } => DecisionTree::new_classifier(n_classes),
            Task::Regression => DecisionTree::new_regressor(),
        }
        .with_max_depth(self.max_depth)
        .with_min_samples_split(self.min_samples_split)
        .with_min_samples_leaf(self.min_samples_leaf)
        .with_max_features(Some(max_features))
        .with_seed(rng.gen());

        tree.fit(&x_boot, &y_boot)?;
        Ok(tree)
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<(), TrainingError> {
        if self.trees.is_empty() {
            return Err(TrainingError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TrainingError::ShapeMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok(())
    }
}

impl Estimator for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), TrainingError> {
        if x.nrows() == 0 {
            return Err(TrainingError::EmptyInput);
        }
        if x.nrows() != y.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        // Every tree must agree on the class count, even if its bootstrap
        // sample misses a class.
        if let Task::Classification { n_classes } = self.task {
            let seen = class_indices(y)?.into_iter().max().map_or(0, |m| m + 1);
            self.task = Task::Classification {
                n_classes: n_classes.max(seen),
            };
        }

        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);

        let forest = &*self;
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|idx| forest.fit_tree(idx, x, y, max_features))
            .collect::<Result<Vec<_>, _>>()?;

        let mut importances = vec![0.0; self.n_features];
        for tree in &trees {
            for (total, imp) in importances.iter_mut().zip(tree.feature_importances()) {
                *total += imp;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= sum);
        }

        debug!(
            "Fitted {} trees on {} rows x {} features",
            trees.len(),
            x.nrows(),
            x.ncols()
        );
        self.trees = trees;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, TrainingError> {
        self.check_fitted(x)?;

        if self.task.is_classification() {
            let proba = self.predict_proba(x)?;
            return Ok(proba
                .rows()
                .into_iter()
                .map(|row| argmax(&row.to_vec()) as f64)
                .collect());
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for prediction in &per_tree {
            sum += prediction;
        }
        Ok(sum / per_tree.len() as f64)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        if !self.task.is_classification() {
            return Err(TrainingError::NotAClassifier);
        }
        self.check_fitted(x)?;

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sum: Array2<f64> = Array2::zeros((x.nrows(), self.n_classes()));
        for proba in &per_tree {
            sum += proba;
        }
        Ok(sum / per_tree.len() as f64)
    }

    fn n_classes(&self) -> usize {
        match self.task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => 0,
        }
    }
}
