//! Training-Only Synthetic Augmentation

use crate::error::PreprocessError;
use feature_engine::{ColumnStatistics, FeatureTable};
use ndarray::{concatenate, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;

/// Physiological bounds a synthetic value is clipped to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl ClipRange {
    fn new(column: &str, min: f64, max: f64) -> Self {
        Self {
            column: column.to_string(),
            min,
            max,
        }
    }
}

/// Augmentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Master switch
    pub enabled: bool,
    /// Total copies including the original (3 = original + 2 synthetic)
    pub factor: usize,
    /// Only augment when the training partition has fewer rows than this
    pub min_rows: usize,
    /// Noise std as a fraction of each column's sample std
    pub noise_fraction: f64,
    /// Noise seed
    pub seed: u64,
    /// Columns copied without noise
    pub exclude_columns: Vec<String>,
    /// Post-noise clipping
    pub clip: Vec<ClipRange>,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            factor: 3,
            min_rows: 1000,
            noise_fraction: 0.05,
            seed: 42,
            exclude_columns: vec!["Record_ID".to_string()],
            clip: vec![
                ClipRange::new("Heart_Rate", 60.0, 200.0),
                ClipRange::new("Step_Count", 0.0, 1000.0),
                ClipRange::new("Body_Temperature", 36.0, 38.0),
                ClipRange::new("Blood_Oxygen", 90.0, 100.0),
            ],
        }
    }
}

/// Gaussian-noise augmenter for a training partition
#[derive(Debug, Clone, Default)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create an augmenter
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Whether a partition of `rows` rows gets augmented
    pub fn applies_to(&self, rows: usize) -> bool {
        self.config.enabled && self.config.factor > 1 && rows < self.config.min_rows
    }

    /// Append `factor - 1` noisy copies of `features`, repeating `labels`.
    ///
    /// Returns the input unchanged when augmentation does not apply.
    pub fn augment<L: Clone>(
        &self,
        features: &FeatureTable,
        labels: &[L],
    ) -> Result<(FeatureTable, Vec<L>), PreprocessError> {
        let rows = features.n_rows();
        if labels.len() != rows {
            return Err(PreprocessError::LabelCount {
                rows,
                labels: labels.len(),
            });
        }
        if !self.applies_to(rows) {
            return Ok((features.clone(), labels.to_vec()));
        }

        let noise_std: Vec<f64> = features
            .columns
            .iter()
            .zip(features.values.columns())
            .map(|(name, column)| {
                if self.config.exclude_columns.contains(name) {
                    return 0.0;
                }
                let std = ColumnStatistics::compute(column.iter()).sample_std_dev();
                if std.is_finite() {
                    std * self.config.noise_fraction
                } else {
                    0.0
                }
            })
            .collect();

        let clip: Vec<Option<(f64, f64)>> = features
            .columns
            .iter()
            .map(|name| {
                self.config
                    .clip
                    .iter()
                    .find(|range| &range.column == name)
                    .map(|range| (range.min, range.max))
            })
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut blocks = vec![features.values.clone()];
        for _ in 1..self.config.factor {
            let mut copy: Array2<f64> = features.values.clone();
            for (col_idx, mut column) in copy.columns_mut().into_iter().enumerate() {
                let std = noise_std[col_idx];
                let bounds = clip[col_idx];
                if std == 0.0 && bounds.is_none() {
                    continue;
                }
                // Clipped columns are bounded even without noise
                for value in column.iter_mut() {
                    if std > 0.0 {
                        *value += gaussian(&mut rng) * std;
                    }
                    if let Some((min, max)) = bounds {
                        *value = value.clamp(min, max);
                    }
                }
            }
            blocks.push(copy);
        }

        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        let values = concatenate(Axis(0), &views).map_err(|_| PreprocessError::ShapeMismatch {
            expected: features.n_cols(),
            actual: 0,
        })?;
        let augmented = FeatureTable::new(features.columns.clone(), values)?;

        let mut repeated = Vec::with_capacity(labels.len() * self.config.factor);
        for _ in 0..self.config.factor {
            repeated.extend_from_slice(labels);
        }

        info!(
            "Augmented training data from {} to {} rows",
            rows,
            augmented.n_rows()
        );
        Ok((augmented, repeated))
    }
}

/// Standard normal sample via Box-Muller
fn gaussian(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(rows: &[Vec<f64>]) -> FeatureTable {
        let columns = ["Heart_Rate", "Step_Count", "Body_Temperature", "Blood_Oxygen", "Record_ID"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        FeatureTable::from_rows(columns, rows).unwrap()
    }

    fn sample_rows() -> Vec<Vec<f64>> {
        (0..20)
            .map(|i| {
                let f = i as f64;
                vec![60.0 + f * 7.0, f * 50.0, 36.0 + f * 0.1, 90.0 + f * 0.5, f]
            })
            .collect()
    }

    #[test]
    fn test_copies_and_labels() {
        let features = table(&sample_rows());
        let labels: Vec<u32> = (0..20).map(|i| i % 2).collect();
        let (augmented, repeated) = Augmenter::default().augment(&features, &labels).unwrap();

        assert_eq!(augmented.n_rows(), 60);
        assert_eq!(repeated.len(), 60);
        assert_eq!(&repeated[20..40], &labels[..]);
        // Originals first, untouched
        assert_eq!(augmented.values.slice(ndarray::s![0..20, ..]), features.values);
        // Excluded column carries no noise
        assert_eq!(
            augmented.values.column(4).to_vec()[40..],
            features.values.column(4).to_vec()[..]
        );
        // Other columns do
        assert_ne!(
            augmented.values.column(0).to_vec()[20..40],
            features.values.column(0).to_vec()[..]
        );
    }

    #[test]
    fn test_large_partitions_untouched() {
        let config = AugmentationConfig {
            min_rows: 10,
            ..Default::default()
        };
        let features = table(&sample_rows());
        let labels = vec![0u32; 20];
        let (augmented, _) = Augmenter::new(config).augment(&features, &labels).unwrap();
        assert_eq!(augmented, features);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let features = table(&sample_rows());
        let labels = vec![0u32; 20];
        let a = Augmenter::default().augment(&features, &labels).unwrap().0;
        let b = Augmenter::default().augment(&features, &labels).unwrap().0;
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_out_of_range_column_is_clipped() {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![50.0, 1200.0 + i as f64, 37.0, 97.0, i as f64])
            .collect();
        let features = table(&rows);
        let (augmented, _) = Augmenter::default()
            .augment(&features, &vec![0u8; 10])
            .unwrap();

        let synthetic = augmented.values.slice(ndarray::s![10.., ..]);
        assert!(synthetic.column(0).iter().all(|&hr| hr == 60.0));
        assert!(synthetic.column(1).iter().all(|&steps| (0.0..=1000.0).contains(&steps)));
        // Originals keep their recorded values
        assert_eq!(augmented.values[[0, 0]], 50.0);
    }

    #[test]
    fn test_label_count_checked() {
        let features = table(&sample_rows());
        let err = Augmenter::default().augment(&features, &[0u32; 3]).unwrap_err();
        assert!(matches!(err, PreprocessError::LabelCount { rows: 20, labels: 3 }));
    }

    proptest! {
        #[test]
        fn prop_synthetic_values_within_clip_bounds(
            rows in prop::collection::vec(
                (20.0f64..=260.0, -200.0f64..=1500.0, 34.0f64..=41.0, 80.0f64..=105.0),
                2..30,
            ),
            seed in any::<u64>(),
        ) {
            let rows: Vec<Vec<f64>> = rows
                .into_iter()
                .enumerate()
                .map(|(i, (hr, steps, temp, oxy))| vec![hr, steps, temp, oxy, i as f64])
                .collect();
            let features = table(&rows);
            let labels = vec![0u8; rows.len()];
            let config = AugmentationConfig { seed, noise_fraction: 0.5, ..Default::default() };
            let (augmented, _) = Augmenter::new(config).augment(&features, &labels).unwrap();

            for row in augmented.values.rows().into_iter().skip(rows.len()) {
                prop_assert!((60.0..=200.0).contains(&row[0]));
                prop_assert!((0.0..=1000.0).contains(&row[1]));
                prop_assert!((36.0..=38.0).contains(&row[2]));
                prop_assert!((90.0..=100.0).contains(&row[3]));
            }
        }
    }
}
