//! Artifact Store Implementation

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Blob layout version written into every header
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";

/// Artifact roles within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    Scaler,
    Encoder,
}

impl ArtifactKind {
    fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model.bin",
            ArtifactKind::Scaler => "scaler.bin",
            ArtifactKind::Encoder => "encoder.bin",
        }
    }
}

/// Prefix of every blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub run_id: Uuid,
    pub domain: String,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    pub format_version: u32,
}

/// One artifact listed in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: ArtifactKind,
    pub file: String,
    pub bytes: usize,
}

/// Human-readable index of a stored run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: Uuid,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub format_version: u32,
    pub artifacts: Vec<ManifestEntry>,
    /// Headline evaluation metrics of the run
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Artifacts of a run being assembled for `ArtifactStore::save`
#[derive(Debug, Clone)]
pub struct PendingRun {
    run_id: Uuid,
    domain: String,
    created_at: DateTime<Utc>,
    blobs: BTreeMap<ArtifactKind, Vec<u8>>,
    metrics: BTreeMap<String, f64>,
}

impl PendingRun {
    /// Start a run with a fresh id
    pub fn new(domain: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            domain: domain.to_string(),
            created_at: Utc::now(),
            blobs: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Encode an artifact behind its header; replaces an earlier one of the same kind
    pub fn add<T: Serialize>(&mut self, kind: ArtifactKind, value: &T) -> Result<(), StorageError> {
        let header = ArtifactHeader {
            run_id: self.run_id,
            domain: self.domain.clone(),
            kind,
            created_at: self.created_at,
            format_version: FORMAT_VERSION,
        };
        let mut blob = postcard::to_allocvec(&header)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let payload = postcard::to_allocvec(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        blob.extend_from_slice(&payload);

        debug!("Encoded {:?} artifact ({} bytes)", kind, blob.len());
        self.blobs.insert(kind, blob);
        Ok(())
    }

    /// Attach headline metrics for the manifest
    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// A run read back from disk, every blob verified against the manifest
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub manifest: Manifest,
    blobs: BTreeMap<ArtifactKind, (ArtifactHeader, Vec<u8>)>,
}

impl LoadedRun {
    pub fn run_id(&self) -> Uuid {
        self.manifest.run_id
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.blobs.contains_key(&kind)
    }

    pub fn header(&self, kind: ArtifactKind) -> Option<&ArtifactHeader> {
        self.blobs.get(&kind).map(|(header, _)| header)
    }

    /// Decode an artifact payload
    pub fn decode<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, StorageError> {
        let (_, payload) = self
            .blobs
            .get(&kind)
            .ok_or(StorageError::MissingArtifact(kind))?;
        postcard::from_bytes(payload).map_err(|e| StorageError::SerializationError(e.to_string()))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Directory-backed artifact store, one subdirectory per domain
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the current run of a domain
    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join(domain)
    }

    /// Write all artifacts of a run, replacing the domain's previous run.
    ///
    /// Everything is written to a staging directory first and renamed into
    /// place; a failure before the rename leaves the previous run untouched.
    pub fn save(&self, run: PendingRun) -> Result<Manifest, StorageError> {
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;

        let staging = self.root.join(format!(".staging-{}-{}", run.domain, run.run_id));
        let result = self.write_staging(&staging, &run);
        let manifest = match result {
            Ok(manifest) => manifest,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let target = self.domain_dir(&run.domain);
        let retired = self.root.join(format!(".retired-{}-{}", run.domain, run.run_id));
        if target.exists() {
            fs::rename(&target, &retired).map_err(io_error(&target))?;
        }
        if let Err(source) = fs::rename(&staging, &target) {
            // Put the previous run back
            if retired.exists() {
                let _ = fs::rename(&retired, &target);
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(StorageError::Io {
                path: target.display().to_string(),
                source,
            });
        }
        if retired.exists() {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("Could not remove retired run {}: {}", retired.display(), e);
            }
        }

        info!(
            "Saved {} run {} ({} artifacts) to {}",
            manifest.domain,
            manifest.run_id,
            manifest.artifacts.len(),
            target.display()
        );
        Ok(manifest)
    }

    fn write_staging(&self, staging: &Path, run: &PendingRun) -> Result<Manifest, StorageError> {
        fs::create_dir_all(staging).map_err(io_error(staging))?;

        let mut artifacts = Vec::with_capacity(run.blobs.len());
        for (kind, blob) in &run.blobs {
            let path = staging.join(kind.file_name());
            fs::write(&path, blob).map_err(io_error(&path))?;
            artifacts.push(ManifestEntry {
                kind: *kind,
                file: kind.file_name().to_string(),
                bytes: blob.len(),
            });
        }

        let manifest = Manifest {
            run_id: run.run_id,
            domain: run.domain.clone(),
            created_at: run.created_at,
            format_version: FORMAT_VERSION,
            artifacts,
            metrics: run.metrics.clone(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let path = staging.join(MANIFEST_FILE);
        fs::write(&path, json).map_err(io_error(&path))?;
        Ok(manifest)
    }

    /// Read the manifest of a domain's current run
    pub fn manifest(&self, domain: &str) -> Result<Manifest, StorageError> {
        let path = self.domain_dir(domain).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(StorageError::NotFound(domain.to_string()));
        }
        let bytes = fs::read(&path).map_err(io_error(&path))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    /// Load every artifact of a domain's current run, rejecting blobs from other runs
    pub fn load(&self, domain: &str) -> Result<LoadedRun, StorageError> {
        let manifest = self.manifest(domain)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion(manifest.format_version));
        }

        let dir = self.domain_dir(domain);
        let mut blobs = BTreeMap::new();
        for entry in &manifest.artifacts {
            let path = dir.join(&entry.file);
            let bytes = fs::read(&path).map_err(io_error(&path))?;
            let (header, payload) = postcard::take_from_bytes::<ArtifactHeader>(&bytes)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;

            if header.format_version != FORMAT_VERSION {
                return Err(StorageError::UnsupportedVersion(header.format_version));
            }
            if header.run_id != manifest.run_id || header.kind != entry.kind {
                return Err(StorageError::RunMismatch {
                    kind: entry.kind,
                    expected: manifest.run_id,
                    found: header.run_id,
                });
            }
            blobs.insert(entry.kind, (header, payload.to_vec()));
        }

        debug!(
            "Loaded {} run {} with {} artifacts",
            domain,
            manifest.run_id,
            blobs.len()
        );
        Ok(LoadedRun { manifest, blobs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Scaler {
        mean: Vec<f64>,
        scale: Vec<f64>,
    }

    fn pending(domain: &str) -> PendingRun {
        let mut run = PendingRun::new(domain);
        run.add(ArtifactKind::Model, &vec![1u8, 2, 3]).unwrap();
        run.add(
            ArtifactKind::Scaler,
            &Scaler {
                mean: vec![70.0, 400.0],
                scale: vec![12.5, 150.0],
            },
        )
        .unwrap();
        run
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut metrics = BTreeMap::new();
        metrics.insert("accuracy".to_string(), 0.91);
        let run = pending("health").with_metrics(metrics);
        let run_id = run.run_id();
        let manifest = store.save(run).unwrap();

        assert_eq!(manifest.run_id, run_id);
        assert_eq!(manifest.artifacts.len(), 2);

        let loaded = store.load("health").unwrap();
        assert_eq!(loaded.run_id(), run_id);
        assert_eq!(loaded.manifest.metrics["accuracy"], 0.91);
        assert!(!loaded.contains(ArtifactKind::Encoder));

        let scaler: Scaler = loaded.decode(ArtifactKind::Scaler).unwrap();
        assert_eq!(scaler.mean, vec![70.0, 400.0]);
        let model: Vec<u8> = loaded.decode(ArtifactKind::Model).unwrap();
        assert_eq!(model, vec![1, 2, 3]);
        assert_eq!(loaded.header(ArtifactKind::Model).unwrap().domain, "health");

        let err = loaded.decode::<Vec<String>>(ArtifactKind::Encoder).unwrap_err();
        assert!(matches!(err, StorageError::MissingArtifact(ArtifactKind::Encoder)));
    }

    #[test]
    fn test_resave_replaces_run_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        store.save(pending("air_quality")).unwrap();
        let second = pending("air_quality");
        let second_id = second.run_id();
        store.save(second).unwrap();

        assert_eq!(store.load("air_quality").unwrap().run_id(), second_id);
        let entries: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["air_quality".to_string()]);
    }

    #[test]
    fn test_mixed_runs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let other = ArtifactStore::new(dir.path().join("other"));

        store.save(pending("health")).unwrap();
        other.save(pending("health")).unwrap();

        // Scaler from a different run copied over the current one
        fs::copy(
            other.domain_dir("health").join("scaler.bin"),
            store.domain_dir("health").join("scaler.bin"),
        )
        .unwrap();

        let err = store.load("health").unwrap_err();
        assert!(matches!(
            err,
            StorageError::RunMismatch {
                kind: ArtifactKind::Scaler,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_domain() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(store.load("health"), Err(StorageError::NotFound(_))));
    }
}
