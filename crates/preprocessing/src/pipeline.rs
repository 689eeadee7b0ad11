//! Split → Augment → Scale

use crate::augment::{AugmentationConfig, Augmenter};
use crate::error::PreprocessError;
use crate::scaler::StandardScaler;
use crate::split::{stratified_split, train_test_split, SplitConfig, SplitIndices};
use feature_engine::FeatureTable;
use ndarray::Array2;
use tracing::info;

/// Scaled partitions ready for an estimator
#[derive(Debug, Clone)]
pub struct Prepared<T> {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Vec<T>,
    pub y_test: Vec<T>,
    /// Scaler fit on the (augmented) training partition
    pub scaler: StandardScaler,
    /// Row indices into the engineered table
    pub split: SplitIndices,
    /// Training rows before augmentation
    pub original_train_rows: usize,
}

fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

fn check_labels(features: &FeatureTable, labels: usize) -> Result<(), PreprocessError> {
    if features.n_rows() != labels {
        return Err(PreprocessError::LabelCount {
            rows: features.n_rows(),
            labels,
        });
    }
    Ok(())
}

fn finish<T: Clone>(
    features: &FeatureTable,
    targets: &[T],
    split: SplitIndices,
    augmenter: Option<&Augmenter>,
) -> Result<Prepared<T>, PreprocessError> {
    let train_table = features.select_rows(&split.train);
    let test_table = features.select_rows(&split.test);
    let y_train = pick(targets, &split.train);
    let y_test = pick(targets, &split.test);
    let original_train_rows = train_table.n_rows();

    let (train_table, y_train) = match augmenter {
        Some(augmenter) => augmenter.augment(&train_table, &y_train)?,
        None => (train_table, y_train),
    };

    let scaler = StandardScaler::fit(&train_table)?;
    let x_train = scaler.transform(&train_table)?;
    let x_test = scaler.transform(&test_table)?;

    info!(
        "Prepared {} train rows ({} before augmentation), {} test rows",
        x_train.nrows(),
        original_train_rows,
        x_test.nrows()
    );

    Ok(Prepared {
        x_train,
        x_test,
        y_train,
        y_test,
        scaler,
        split,
        original_train_rows,
    })
}

/// Stratified split, training-only augmentation, scaling
pub fn prepare_classification(
    features: &FeatureTable,
    labels: &[usize],
    split: &SplitConfig,
    augmentation: &AugmentationConfig,
) -> Result<Prepared<usize>, PreprocessError> {
    check_labels(features, labels.len())?;
    let indices = stratified_split(labels, split)?;
    let augmenter = Augmenter::new(augmentation.clone());
    finish(features, labels, indices, Some(&augmenter))
}

/// Shuffled split and scaling
pub fn prepare_regression(
    features: &FeatureTable,
    targets: &[f64],
    split: &SplitConfig,
) -> Result<Prepared<f64>, PreprocessError> {
    check_labels(features, targets.len())?;
    let indices = train_test_split(features.n_rows(), split)?;
    finish(features, targets, indices, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_like(n: usize) -> (FeatureTable, Vec<usize>) {
        let columns = vec!["Heart_Rate".to_string(), "Step_Count".to_string()];
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![70.0 + (i % 90) as f64, (i * 13 % 1000) as f64])
            .collect();
        let labels = (0..n).map(|i| i % 3).collect();
        (FeatureTable::from_rows(columns, &rows).unwrap(), labels)
    }

    #[test]
    fn test_test_partition_is_not_augmented() {
        let (features, labels) = health_like(50);
        let prepared = prepare_classification(
            &features,
            &labels,
            &SplitConfig::default(),
            &AugmentationConfig::default(),
        )
        .unwrap();

        assert_eq!(prepared.original_train_rows, 40);
        assert_eq!(prepared.x_train.nrows(), 120);
        assert_eq!(prepared.y_train.len(), 120);
        assert_eq!(prepared.x_test.nrows(), 10);

        // Test rows are exactly the selected raw rows, scaled
        let raw_test = features.select_rows(&prepared.split.test);
        let expected = prepared.scaler.transform(&raw_test).unwrap();
        assert_eq!(prepared.x_test, expected);
        assert_eq!(prepared.y_test, pick(&labels, &prepared.split.test));
    }

    #[test]
    fn test_augmentation_does_not_change_test_partition() {
        let (features, labels) = health_like(50);
        let with = prepare_classification(
            &features,
            &labels,
            &SplitConfig::default(),
            &AugmentationConfig::default(),
        )
        .unwrap();
        let without = prepare_classification(
            &features,
            &labels,
            &SplitConfig::default(),
            &AugmentationConfig {
                enabled: false,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(with.split, without.split);
        assert_eq!(with.y_test, without.y_test);
        assert_eq!(
            features.select_rows(&with.split.test),
            features.select_rows(&without.split.test)
        );
    }

    #[test]
    fn test_regression_has_no_augmentation() {
        let (features, _) = health_like(20);
        let targets: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let prepared = prepare_regression(&features, &targets, &SplitConfig::default()).unwrap();
        assert_eq!(prepared.x_train.nrows(), 16);
        assert_eq!(prepared.original_train_rows, 16);
        assert_eq!(prepared.x_test.nrows(), 4);
    }

    #[test]
    fn test_label_count_checked() {
        let (features, _) = health_like(10);
        let err = prepare_regression(&features, &[1.0], &SplitConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::LabelCount { rows: 10, labels: 1 }));
    }
}
