//! CART Decision Tree

use crate::estimator::{Classifier, Estimator};
use crate::TrainingError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// What a tree predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Class indices `0..n_classes`, split on Gini impurity
    Classification { n_classes: usize },
    /// Continuous target, split on mean squared error
    Regression,
}

impl Task {
    pub fn is_classification(&self) -> bool {
        matches!(self, Task::Classification { .. })
    }
}

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the prediction; `distribution` is empty for regression
    Leaf {
        value: f64,
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node: rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Prediction task
    pub task: Task,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per node (all when `None`)
    pub max_features: Option<usize>,
    /// Seed of the per-node feature draws
    pub seed: u64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

/// Best split found for one node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    fn with_task(task: Task) -> Self {
        Self {
            root: None,
            task,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Create a classifier tree; `n_classes = 0` infers it from the labels
    pub fn new_classifier(n_classes: usize) -> Self {
        Self::with_task(Task::Classification { n_classes })
    }

    /// Create a regressor tree
    pub fn new_regressor() -> Self {
        Self::with_task(Task::Regression)
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set features drawn per node
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the feature-draw seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Normalized impurity decrease per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Depth of the fitted tree (a single leaf has depth 1)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    fn n_classes_value(&self) -> usize {
        match self.task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => 0,
        }
    }

    fn leaf_for(&self, sample: ArrayView1<'_, f64>) -> Result<&TreeNode, TrainingError> {
        let mut node = self.root.as_ref().ok_or(TrainingError::NotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { .. } => return Ok(node),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if sample[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<(), TrainingError> {
        if self.root.is_none() {
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

/// Recursive builder state for one `fit` call
struct Builder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    classes: Vec<usize>,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

impl Builder<'_> {
    fn impurity(&self, indices: &[usize]) -> f64 {
        match self.tree.task {
            Task::Classification { n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &i in indices {
                    counts[self.classes[i]] += 1;
                }
                gini(&counts, indices.len())
            }
            Task::Regression => {
                let n = indices.len() as f64;
                let (sum, sq) = indices
                    .iter()
                    .fold((0.0, 0.0), |(s, q), &i| (s + self.y[i], q + self.y[i] * self.y[i]));
                (sq / n - (sum / n).powi(2)).max(0.0)
            }
        }
    }

    fn leaf(&self, indices: &[usize]) -> TreeNode {
        let n = indices.len();
        match self.tree.task {
            Task::Classification { n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &i in indices {
                    counts[self.classes[i]] += 1;
                }
                let distribution: Vec<f64> =
                    counts.iter().map(|&c| c as f64 / n.max(1) as f64).collect();
                TreeNode::Leaf {
                    value: argmax(&distribution) as f64,
                    distribution,
                    n_samples: n,
                }
            }
            Task::Regression => TreeNode::Leaf {
                value: indices.iter().map(|&i| self.y[i]).sum::<f64>() / n.max(1) as f64,
                distribution: Vec::new(),
                n_samples: n,
            },
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.tree.max_features {
            Some(k) if k < n_features => {
                let mut features = sample(&mut self.rng, n_features, k.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&mut self, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.tree.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in self.candidate_features() {
            let mut sorted: Vec<(f64, usize)> =
                indices.iter().map(|&i| (self.x[[i, feature_idx]], i)).collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut scan = SplitScan::new(self, indices);
            for pos in 0..n - 1 {
                scan.move_left(self, sorted[pos].1);
                if sorted[pos].0 == sorted[pos + 1].0 {
                    continue;
                }
                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let weighted = scan.weighted_impurity(left_n, right_n);
                let gain = parent_impurity - weighted;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (sorted[pos].0 + sorted[pos + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn build(&mut self, indices: &[usize], depth: usize) -> TreeNode {
        let n = indices.len();
        let impurity = self.impurity(indices);

        let stop = n < self.tree.min_samples_split
            || n < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 0.0;
        if stop {
            return self.leaf(indices);
        }

        let Some(split) = self.best_split(indices, impurity) else {
            return self.leaf(indices);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, split.feature_idx]] <= split.threshold);

        self.importances[split.feature_idx] += n as f64 * split.gain;

        let left = Box::new(self.build(&left, depth + 1));
        let right = Box::new(self.build(&right, depth + 1));
        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples: n,
            impurity,
        }
    }
}

/// Running left/right sufficient statistics while sweeping one feature
enum SplitScan {
    Classes { left: Vec<usize>, right: Vec<usize> },
    Moments { left: (f64, f64), right: (f64, f64) },
}

impl SplitScan {
    fn new(builder: &Builder<'_>, indices: &[usize]) -> Self {
        match builder.tree.task {
            Task::Classification { n_classes } => {
                let mut right = vec![0usize; n_classes];
                for &i in indices {
                    right[builder.classes[i]] += 1;
                }
                SplitScan::Classes {
                    left: vec![0; n_classes],
                    right,
                }
            }
            Task::Regression => {
                let right = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
                    let y = builder.y[i];
                    (s + y, q + y * y)
                });
                SplitScan::Moments {
                    left: (0.0, 0.0),
                    right,
                }
            }
        }
    }

    fn move_left(&mut self, builder: &Builder<'_>, row: usize) {
        match self {
            SplitScan::Classes { left, right } => {
                let class = builder.classes[row];
                left[class] += 1;
                right[class] -= 1;
            }
            SplitScan::Moments { left, right } => {
                let y = builder.y[row];
                left.0 += y;
                left.1 += y * y;
                right.0 -= y;
                right.1 -= y * y;
            }
        }
    }

    fn weighted_impurity(&self, left_n: usize, right_n: usize) -> f64 {
        let n = (left_n + right_n) as f64;
        let (l, r) = match self {
            SplitScan::Classes { left, right } => (gini(left, left_n), gini(right, right_n)),
            SplitScan::Moments { left, right } => {
                let var = |(s, q): (f64, f64), c: usize| {
                    let c = c as f64;
                    (q / c - (s / c).powi(2)).max(0.0)
                };
                (var(*left, left_n), var(*right, right_n))
            }
        };
        (left_n as f64 * l + right_n as f64 * r) / n
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Index of the largest value; the lowest index wins ties
pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

/// Convert float labels into class indices
pub(crate) fn class_indices(y: &Array1<f64>) -> Result<Vec<usize>, TrainingError> {
    y.iter()
        .map(|&v| {
            if v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(TrainingError::InvalidLabel(v))
            }
        })
        .collect()
}

impl Estimator for DecisionTree {
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

        let classes = match self.task {
            Task::Classification { n_classes } => {
                let classes = class_indices(y)?;
                let seen = classes.iter().max().map_or(0, |m| m + 1);
                if n_classes == 0 {
                    self.task = Task::Classification { n_classes: seen };
                } else if seen > n_classes {
                    return Err(TrainingError::InvalidLabel((seen - 1) as f64));
                }
                classes
            }
            Task::Regression => Vec::new(),
        };

        self.n_features = x.ncols();
        let mut builder = Builder {
            tree: &*self,
            x,
            y,
            classes,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            importances: vec![0.0; x.ncols()],
        };
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = builder.build(&indices, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }

        self.root = Some(root);
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, TrainingError> {
        self.check_width(x)?;
        x.rows()
            .into_iter()
            .map(|row| match self.leaf_for(row)? {
                TreeNode::Leaf { value, .. } => Ok(*value),
                TreeNode::Split { .. } => Err(TrainingError::NotFitted),
            })
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from_vec)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Classifier for DecisionTree {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        let n_classes = match self.task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => return Err(TrainingError::NotAClassifier),
        };
        self.check_width(x)?;

        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = self.leaf_for(row)? {
                for (k, p) in distribution.iter().enumerate() {
                    proba[[i, k]] = *p;
                }
            }
        }
        Ok(proba)
    }

    fn n_classes(&self) -> usize {
        self.n_classes_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [10.0, 1.0], [11.0, 0.0], [12.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier(0);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.n_classes(), 2);
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 2);
        // Only the first feature separates the classes
        assert_eq!(tree.feature_importances(), &[1.0, 0.0]);

        let proba = tree.predict_proba(&array![[0.0, 0.0], [20.0, 0.0]]).unwrap();
        assert_eq!(proba, array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_regressor_fits_steps() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 9.0, 9.0];
        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[0.4], [2.6]]).unwrap(), array![5.0, 9.0]);
        assert!(tree.predict_proba(&x).is_err());
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let mut tree = DecisionTree::new_regressor().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 1.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier(2).with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();

        fn smallest_leaf(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { n_samples, .. } => *n_samples,
                TreeNode::Split { left, right, .. } => smallest_leaf(left).min(smallest_leaf(right)),
            }
        }
        // The pure split after the first row would leave a single-row leaf
        assert_eq!(smallest_leaf(tree.root.as_ref().unwrap()), 2);
    }

    #[test]
    fn test_errors() {
        let mut tree = DecisionTree::new_classifier(0);
        assert!(matches!(tree.predict(&array![[1.0]]), Err(TrainingError::NotFitted)));
        assert!(matches!(
            tree.fit(&array![[1.0], [2.0]], &array![0.5, 1.0]),
            Err(TrainingError::InvalidLabel(_))
        ));
        tree.fit(&array![[1.0], [2.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0, 2.0]]),
            Err(TrainingError::ShapeMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_argmax_prefers_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
