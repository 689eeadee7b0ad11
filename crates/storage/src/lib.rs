//! Storage Layer
//!
//! Persists the artifacts of a training run (model, scaler, optional
//! encoder) as postcard blobs under one directory per domain, swapped in
//! atomically and tied together by a shared run id.

mod artifacts;

pub use artifacts::{
    ArtifactHeader, ArtifactKind, ArtifactStore, LoadedRun, Manifest, ManifestEntry, PendingRun,
    FORMAT_VERSION,
};

use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No artifacts stored for {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("{kind:?} artifact belongs to run {found}, manifest names run {expected}")]
    RunMismatch {
        kind: ArtifactKind,
        expected: Uuid,
        found: Uuid,
    },
    #[error("Artifact {0:?} is not part of the run")]
    MissingArtifact(ArtifactKind),
    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),
}
