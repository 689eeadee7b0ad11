//! Label Encoding

use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps the sorted unique labels to `0..k`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the labels of a full table
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self, PreprocessError> {
        let classes: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        if classes.is_empty() {
            return Err(PreprocessError::Empty);
        }
        Ok(Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        })
    }

    /// Class names in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Index of one label
    pub fn encode(&self, label: &str) -> Result<usize, PreprocessError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PreprocessError::UnknownLabel(label.to_string()))
    }

    /// Indices of many labels
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, PreprocessError> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    /// Label of one index
    pub fn decode(&self, class: usize) -> Result<&str, PreprocessError> {
        self.classes
            .get(class)
            .map(String::as_str)
            .ok_or(PreprocessError::UnknownClass(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_classes() {
        let encoder = LabelEncoder::fit(&["Walking", "Cycling", "Running", "Walking"]).unwrap();
        assert_eq!(encoder.classes(), &["Cycling", "Running", "Walking"]);
        assert_eq!(
            encoder.transform(&["Walking", "Cycling"]).unwrap(),
            vec![2, 0]
        );
        assert_eq!(encoder.decode(1).unwrap(), "Running");
    }

    #[test]
    fn test_unknown_values() {
        let encoder = LabelEncoder::fit(&["a", "b"]).unwrap();
        assert!(matches!(encoder.encode("c"), Err(PreprocessError::UnknownLabel(_))));
        assert!(matches!(encoder.decode(2), Err(PreprocessError::UnknownClass(2))));
        assert!(LabelEncoder::fit::<&str>(&[]).is_err());
    }
}
