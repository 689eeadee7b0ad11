//! K-Fold Cross-Validation

use crate::estimator::Estimator;
use crate::metrics::{accuracy, r2_score};
use crate::tree::class_indices;
use crate::TrainingError;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One train/validation partition of the row indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn check_splits(n_splits: usize, n_samples: usize) -> Result<(), TrainingError> {
    if n_splits < 2 {
        return Err(TrainingError::InvalidConfig(format!(
            "cross-validation needs at least 2 folds, got {}",
            n_splits
        )));
    }
    if n_samples < n_splits {
        return Err(TrainingError::InvalidConfig(format!(
            "{} samples cannot fill {} folds",
            n_samples, n_splits
        )));
    }
    Ok(())
}

fn folds_from(assignment: Vec<Vec<usize>>) -> Vec<Fold> {
    (0..assignment.len())
        .map(|k| Fold {
            test: assignment[k].clone(),
            train: assignment
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != k)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect(),
        })
        .collect()
}

/// Shuffled K-fold splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// Folds over `0..n_samples`; the first `n % k` folds get one extra row
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>, TrainingError> {
        check_splits(self.n_splits, n_samples)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut assignment = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = if k < remainder { base + 1 } else { base };
            assignment.push(indices[start..start + size].to_vec());
            start += size;
        }
        Ok(folds_from(assignment))
    }
}

/// K-fold splitter that keeps class proportions in every fold.
///
/// Members of each class are shuffled and dealt round-robin; the dealing
/// position carries over between classes so small classes do not all land in
/// the first fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, labels: &[usize]) -> Result<Vec<Fold>, TrainingError> {
        check_splits(self.n_splits, labels.len())?;

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![Vec::new(); self.n_splits];
        let mut position = 0;
        for members in by_class.values_mut() {
            members.shuffle(&mut rng);
            for &idx in members.iter() {
                assignment[position % self.n_splits].push(idx);
                position += 1;
            }
        }
        for fold in &mut assignment {
            fold.sort_unstable();
        }
        Ok(folds_from(assignment))
    }
}

/// Score used to rate a fold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    R2,
}

impl Scoring {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64, TrainingError> {
        match self {
            Scoring::Accuracy => {
                let truth = class_indices(y_true)?;
                let predicted = class_indices(y_pred)?;
                Ok(accuracy(&truth, &predicted))
            }
            Scoring::R2 => Ok(r2_score(&y_true.to_vec(), &y_pred.to_vec())),
        }
    }
}

/// Per-fold scores with their mean and (population) standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    pub scoring: Scoring,
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScores {
    fn from_scores(scoring: Scoring, scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scoring,
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Fit a fresh clone of `template` on every fold and score it on the held-out rows
pub fn cross_val_score<E: Estimator + Clone>(
    template: &E,
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: &[Fold],
    scoring: Scoring,
) -> Result<CvScores, TrainingError> {
    if x.nrows() != y.len() {
        return Err(TrainingError::ShapeMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }

    let mut scores = Vec::with_capacity(folds.len());
    for (k, fold) in folds.iter().enumerate() {
        let mut estimator = template.clone();
        estimator.fit(&x.select(Axis(0), &fold.train), &y.select(Axis(0), &fold.train))?;

        let predicted = estimator.predict(&x.select(Axis(0), &fold.test))?;
        let score = scoring.score(&y.select(Axis(0), &fold.test), &predicted)?;
        debug!("Fold {}: {:?} = {:.4}", k, scoring, score);
        scores.push(score);
    }

    Ok(CvScores::from_scores(scoring, scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::RandomForest;
    use proptest::prelude::*;

    #[test]
    fn test_kfold_partitions_every_row_once() {
        let folds = KFold::new(5, 42).split(23).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 23);
            assert!(fold.test.iter().all(|i| !fold.train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_rejects_too_few_samples() {
        assert!(KFold::new(5, 0).split(3).is_err());
        assert!(KFold::new(1, 0).split(10).is_err());
    }

    #[test]
    fn test_cross_val_score_on_separable_classes() {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let class = (i % 3) as f64;
            class * 10.0 + (i as f64 * 0.01) + j as f64
        });
        let y = Array1::from_shape_fn(n, |i| (i % 3) as f64);
        let labels: Vec<usize> = (0..n).map(|i| i % 3).collect();

        let folds = StratifiedKFold::new(5, 42).split(&labels).unwrap();
        let template = RandomForest::new_classifier(10, 3).with_seed(7);
        let cv = cross_val_score(&template, &x, &y, &folds, Scoring::Accuracy).unwrap();

        assert_eq!(cv.scores.len(), 5);
        assert!(cv.mean > 0.9, "mean accuracy {}", cv.mean);
        assert!(cv.std >= 0.0);
    }

    #[test]
    fn test_scores_summary() {
        let cv = CvScores::from_scores(Scoring::R2, vec![0.5, 0.7]);
        assert!((cv.mean - 0.6).abs() < 1e-12);
        assert!((cv.std - 0.1).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_stratified_folds_balance_classes(
            labels in proptest::collection::vec(0usize..3, 20..200),
            n_splits in 2usize..6,
        ) {
            let folds = StratifiedKFold::new(n_splits, 1).split(&labels).unwrap();
            for class in 0..3 {
                let total = labels.iter().filter(|l| **l == class).count();
                for fold in &folds {
                    let in_fold = fold.test.iter().filter(|i| labels[**i] == class).count();
                    let lower = total / n_splits;
                    prop_assert!(in_fold >= lower && in_fold <= lower + 1);
                }
            }
        }
    }
}
