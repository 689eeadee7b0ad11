//! Gradient Boosted Trees
//!
//! Squared-error boosting for regression and softmax boosting for
//! classification: each round fits one regression tree per output to the
//! negative gradient and adds it, shrunk by the learning rate, to the raw
//! scores of every row.

use crate::estimator::{Classifier, Estimator};
use crate::tree::{argmax, class_indices, DecisionTree, Task};
use crate::TrainingError;
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Depth used when none is configured
const DEFAULT_DEPTH: usize = 3;

/// Gradient boosted ensemble of regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// One tree per output per round
    rounds: Vec<Vec<DecisionTree>>,
    /// Prediction task
    pub task: Task,
    /// Boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn without replacement per round
    pub subsample: f64,
    pub seed: u64,
    /// Raw score before the first round, per output
    initial: Vec<f64>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoosting {
    fn with_task(task: Task, n_estimators: usize) -> Self {
        Self {
            rounds: Vec::new(),
            task,
            n_estimators,
            learning_rate: 0.1,
            max_depth: Some(DEFAULT_DEPTH),
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
            initial: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Create a classifier; `n_classes = 0` infers it from the labels
    pub fn new_classifier(n_estimators: usize, n_classes: usize) -> Self {
        Self::with_task(Task::Classification { n_classes }, n_estimators)
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::with_task(Task::Regression, n_estimators)
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set maximum depth; `None` keeps shallow trees of depth 3
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth.or(Some(DEFAULT_DEPTH));
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fitted rounds
    pub fn rounds(&self) -> &[Vec<DecisionTree>] {
        &self.rounds
    }

    /// Summed per-tree importances, normalized
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn n_outputs(&self) -> usize {
        match self.task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => 1,
        }
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        if self.rounds.is_empty() {
            return Err(TrainingError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TrainingError::ShapeMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let mut scores = Array2::zeros((x.nrows(), self.initial.len()));
        for (k, &init) in self.initial.iter().enumerate() {
            scores.column_mut(k).fill(init);
        }
        for round in &self.rounds {
            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                scores
                    .column_mut(k)
                    .scaled_add(self.learning_rate, &update);
            }
        }
        Ok(scores)
    }
}

/// Row-wise softmax of raw scores
fn softmax(scores: &Array2<f64>) -> Array2<f64> {
    let mut proba = scores.clone();
    for mut row in proba.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    proba
}

impl Estimator for GradientBoosting {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), TrainingError> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(TrainingError::EmptyInput);
        }
        if n_samples != y.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: n_samples,
                actual: y.len(),
            });
        }
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }

        // One-hot targets for classification, the raw target for regression
        let targets: Array2<f64> = match self.task {
            Task::Classification { n_classes } => {
                let classes = class_indices(y)?;
                let seen = classes.iter().max().map_or(0, |m| m + 1);
                let n_classes = if n_classes == 0 {
                    seen
                } else if seen > n_classes {
                    return Err(TrainingError::InvalidLabel((seen - 1) as f64));
                } else {
                    n_classes
                };
                self.task = Task::Classification { n_classes };
                let mut onehot = Array2::zeros((n_samples, n_classes));
                for (i, &class) in classes.iter().enumerate() {
                    onehot[[i, class]] = 1.0;
                }
                onehot
            }
            Task::Regression => y.clone().insert_axis(Axis(1)),
        };

        self.initial = match self.task {
            Task::Classification { .. } => targets
                .mean_axis(Axis(0))
                .map(|prior| prior.mapv(|p| p.max(1e-10).ln()).to_vec())
                .unwrap_or_default(),
            Task::Regression => vec![y.mean().unwrap_or(0.0)],
        };
        self.n_features = x.ncols();

        let n_outputs = self.n_outputs();
        let mut scores = Array2::zeros((n_samples, n_outputs));
        for (k, &init) in self.initial.iter().enumerate() {
            scores.column_mut(k).fill(init);
        }

        let sample_size = ((n_samples as f64) * self.subsample).ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut importances = vec![0.0; x.ncols()];
        let mut rounds = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let current = if self.task.is_classification() {
                softmax(&scores)
            } else {
                scores.clone()
            };
            let gradient = &targets - &current;

            let mut rows: Vec<usize> = if sample_size < n_samples {
                sample(&mut rng, n_samples, sample_size).into_vec()
            } else {
                (0..n_samples).collect()
            };
            rows.sort_unstable();
            let x_round = x.select(Axis(0), &rows);

            let mut round = Vec::with_capacity(n_outputs);
            for k in 0..n_outputs {
                let residual: Array1<f64> = rows.iter().map(|&i| gradient[[i, k]]).collect();
                let mut tree = DecisionTree::new_regressor()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_seed(rng.gen());
                tree.fit(&x_round, &residual)?;

                let update = tree.predict(x)?;
                scores
                    .column_mut(k)
                    .scaled_add(self.learning_rate, &update);
                for (total, imp) in importances.iter_mut().zip(tree.feature_importances()) {
                    *total += imp;
                }
                round.push(tree);
            }
            rounds.push(round);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }

        debug!(
            "Fitted {} boosting rounds x {} outputs on {} rows",
            rounds.len(),
            n_outputs,
            n_samples
        );
        self.rounds = rounds;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, TrainingError> {
        let scores = self.raw_scores(x)?;
        Ok(match self.task {
            Task::Regression => scores.column(0).to_owned(),
            Task::Classification { .. } => scores
                .rows()
                .into_iter()
                .map(|row| argmax(&row.to_vec()) as f64)
                .collect(),
        })
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for GradientBoosting {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        if !self.task.is_classification() {
            return Err(TrainingError::NotAClassifier);
        }
        Ok(softmax(&self.raw_scores(x)?))
    }

    fn n_classes(&self) -> usize {
        match self.task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{accuracy, mean_squared_error};

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| (i * 2 + j) as f64 * 0.1);
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();
        (x, y)
    }

    fn three_class_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((90, 2), |(i, j)| {
            let class = (i % 3) as f64;
            if j == 0 {
                class * 10.0 + (i / 3) as f64 * 0.1
            } else {
                (i % 7) as f64
            }
        });
        let y: Array1<f64> = (0..90).map(|i| (i % 3) as f64).collect();
        (x, y)
    }

    #[test]
    fn test_regressor_beats_the_mean() {
        let (x, y) = regression_data();
        let mut model = GradientBoosting::new_regressor(30).with_seed(7);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let mse = mean_squared_error(&y.to_vec(), &predictions.to_vec());
        let variance = y.var(0.0);
        assert!(mse < variance / 10.0, "mse {} vs variance {}", mse, variance);
        assert!(matches!(model.predict_proba(&x), Err(TrainingError::NotAClassifier)));
    }

    #[test]
    fn test_multiclass_probabilities() {
        let (x, y) = three_class_data();
        let mut model = GradientBoosting::new_classifier(20, 0).with_subsample(0.8);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_classes(), 3);
        assert_eq!(model.rounds().len(), 20);
        assert!(model.rounds().iter().all(|round| round.len() == 3));

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let predicted: Vec<usize> = model.predict(&x).unwrap().iter().map(|&p| p as usize).collect();
        let expected: Vec<usize> = y.iter().map(|&c| c as usize).collect();
        assert!(accuracy(&expected, &predicted) > 0.95);

        let importance = model.feature_importances();
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = three_class_data();
        let fit = || {
            let mut model = GradientBoosting::new_classifier(5, 3).with_subsample(0.5);
            model.fit(&x, &y).unwrap();
            model.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_invalid_configuration() {
        let (x, y) = regression_data();
        let mut model = GradientBoosting::new_regressor(5).with_subsample(0.0);
        assert!(matches!(model.fit(&x, &y), Err(TrainingError::InvalidConfig(_))));

        let unfitted = GradientBoosting::new_regressor(5);
        assert!(matches!(unfitted.predict(&x), Err(TrainingError::NotFitted)));
    }
}
