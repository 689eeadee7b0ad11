//! Split, Augmentation and Scaling
//!
//! Everything between engineered features and model fitting. The split is
//! taken first; augmentation and scaler fitting only ever see the training
//! partition.

mod augment;
mod encoder;
mod error;
mod pipeline;
mod scaler;
mod split;

pub use augment::{AugmentationConfig, Augmenter, ClipRange};
pub use encoder::LabelEncoder;
pub use error::PreprocessError;
pub use pipeline::{prepare_classification, prepare_regression, Prepared};
pub use scaler::StandardScaler;
pub use split::{stratified_split, train_test_split, SplitConfig, SplitIndices};
