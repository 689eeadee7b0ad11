//! Train/Test Splitting

use crate::error::PreprocessError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// Split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Number of test rows for `n` rows: `ceil(n * test_fraction)`
    pub fn test_size(&self, n: usize) -> Result<usize, PreprocessError> {
        let invalid = PreprocessError::InvalidSplit {
            rows: n,
            fraction: self.test_fraction,
        };
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid);
        }
        let n_test = (n as f64 * self.test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(invalid);
        }
        Ok(n_test)
    }
}

/// Disjoint row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffled split of `n` rows
pub fn train_test_split(n: usize, config: &SplitConfig) -> Result<SplitIndices, PreprocessError> {
    let n_test = config.test_size(n)?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);

    debug!("Split {} rows into {} train / {} test", n, train.len(), indices.len());
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Split preserving the proportion of every label in both partitions.
///
/// Each class receives `floor(count * n_test / n)` test rows; the rows still
/// missing are handed out by largest fractional remainder, ties going to the
/// larger class and then to the smaller label.
pub fn stratified_split<L>(labels: &[L], config: &SplitConfig) -> Result<SplitIndices, PreprocessError>
where
    L: Ord + Debug,
{
    let n = labels.len();
    let n_test = config.test_size(n)?;

    let mut classes: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(idx);
    }

    if let Some((label, members)) = classes.iter().find(|(_, members)| members.len() < 2) {
        return Err(PreprocessError::ClassTooSmall {
            label: format!("{:?}", label),
            count: members.len(),
        });
    }

    let mut allocation: Vec<(usize, f64, usize)> = classes
        .values()
        .map(|members| {
            let exact = members.len() as f64 * n_test as f64 / n as f64;
            (exact.floor() as usize, exact - exact.floor(), members.len())
        })
        .collect();

    let assigned: usize = allocation.iter().map(|(base, _, _)| base).sum();
    let mut by_remainder: Vec<usize> = (0..allocation.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        allocation[b]
            .1
            .total_cmp(&allocation[a].1)
            .then(allocation[b].2.cmp(&allocation[a].2))
            .then(a.cmp(&b))
    });
    for &class in by_remainder.iter().take(n_test.saturating_sub(assigned)) {
        allocation[class].0 += 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (members, (take, _, _)) in classes.into_values().zip(&allocation) {
        let mut members = members;
        members.shuffle(&mut rng);
        let rest = members.split_off(*take);
        test.extend(members);
        train.extend(rest);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    debug!(
        "Stratified split of {} rows over {} classes: {} train / {} test",
        n,
        allocation.len(),
        train.len(),
        test.len()
    );
    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_sizes_use_ceiling() {
        let split = train_test_split(11, &SplitConfig::default()).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let split = train_test_split(100, &SplitConfig::default()).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let labels: Vec<u8> = (0..60).map(|i| (i % 3) as u8).collect();
        let config = SplitConfig::default();
        assert_eq!(
            stratified_split(&labels, &config).unwrap(),
            stratified_split(&labels, &config).unwrap()
        );
        let other = SplitConfig { seed: 7, ..config };
        assert_ne!(
            stratified_split(&labels, &SplitConfig::default()).unwrap(),
            stratified_split(&labels, &other).unwrap()
        );
    }

    #[test]
    fn test_stratified_exact_proportions() {
        let labels: Vec<&str> = std::iter::repeat("Running")
            .take(50)
            .chain(std::iter::repeat("Walking").take(30))
            .chain(std::iter::repeat("Resting").take(20))
            .collect();
        let split = stratified_split(&labels, &SplitConfig::default()).unwrap();
        let count = |label: &str| split.test.iter().filter(|&&i| labels[i] == label).count();
        assert_eq!(count("Running"), 10);
        assert_eq!(count("Walking"), 6);
        assert_eq!(count("Resting"), 4);
    }

    #[test]
    fn test_singleton_class_rejected() {
        let labels = vec!["a", "a", "a", "b"];
        let err = stratified_split(&labels, &SplitConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::ClassTooSmall { count: 1, .. }));
    }

    #[test]
    fn test_invalid_fraction() {
        let config = SplitConfig {
            test_fraction: 1.0,
            ..Default::default()
        };
        assert!(train_test_split(10, &config).is_err());
        assert!(train_test_split(1, &SplitConfig::default()).is_err());
    }

    proptest! {
        #[test]
        fn prop_stratified_preserves_proportions(
            counts in prop::collection::vec(2usize..40, 1..5),
            fraction in 0.1f64..0.5,
        ) {
            let labels: Vec<usize> = counts
                .iter()
                .enumerate()
                .flat_map(|(class, &count)| std::iter::repeat(class).take(count))
                .collect();
            let config = SplitConfig { test_fraction: fraction, seed: 42 };
            let n = labels.len();
            let n_test = config.test_size(n).unwrap();
            let split = stratified_split(&labels, &config).unwrap();

            prop_assert_eq!(split.test.len(), n_test);
            prop_assert_eq!(split.train.len() + split.test.len(), n);
            let test: HashSet<usize> = split.test.iter().copied().collect();
            prop_assert!(split.train.iter().all(|i| !test.contains(i)));

            for (class, &count) in counts.iter().enumerate() {
                let in_test = split.test.iter().filter(|&&i| labels[i] == class).count();
                let expected = count as f64 * n_test as f64 / n as f64;
                prop_assert!((in_test as f64 - expected).abs() < 1.0);
            }
        }
    }
}
