//! Model artifact persistence
//!
//! Two files are published per model:
//! - the model itself (bincode), which embeds its feature order
//! - a JSON feature manifest, readable without decoding the model
//!
//! Each is written to a temporary file in the target directory and renamed
//! into place, model first. The model file is authoritative: a manifest
//! naming a different model is the previous publish not yet replaced, and
//! is ignored by [`ArtifactStore::load`].

use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use super::TrainedModel;
use crate::config::ModelConfig;
use crate::forecast::is_known_feature;

/// Bumped whenever the on-disk layout or feature semantics change.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found at {0}")]
    Missing(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode artifact: {0}")]
    Encode(String),

    #[error("corrupt artifact {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("artifact schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("feature manifest {manifest:?} does not match model features {model:?}")]
    FeatureMismatch {
        model: Vec<String>,
        manifest: Vec<String>,
    },

    #[error("artifact requires unknown feature '{0}'")]
    UnknownFeature(String),
}

/// Sidecar listing the ordered inputs of a persisted model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureManifest {
    pub schema_version: u32,
    pub model_id: String,
    pub feature_names: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ModelEnvelope<M> {
    schema_version: u32,
    model: M,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    model_path: PathBuf,
    features_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(model_path: impl Into<PathBuf>, features_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            features_path: features_path.into(),
        }
    }

    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self::new(&cfg.artifact_path, &cfg.features_path)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn features_path(&self) -> &Path {
        &self.features_path
    }

    /// Publish `model` and its feature manifest.
    pub fn save(&self, model: &TrainedModel) -> Result<(), ArtifactError> {
        let bytes = self.write_model(model)?;
        self.write_manifest(model)?;

        info!(
            model_id = %model.metadata.model_id,
            path = %self.model_path.display(),
            bytes,
            "model artifact published"
        );
        Ok(())
    }

    fn write_model(&self, model: &TrainedModel) -> Result<usize, ArtifactError> {
        let envelope = ModelEnvelope {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            model,
        };
        let bytes =
            bincode::serialize(&envelope).map_err(|e| ArtifactError::Encode(e.to_string()))?;
        write_atomic(&self.model_path, &bytes)?;
        Ok(bytes.len())
    }

    fn write_manifest(&self, model: &TrainedModel) -> Result<(), ArtifactError> {
        let manifest = FeatureManifest {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            model_id: model.metadata.model_id.clone(),
            feature_names: model.metadata.feature_names.clone(),
        };
        let bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|e| ArtifactError::Encode(e.to_string()))?;
        write_atomic(&self.features_path, &bytes)
    }

    /// Read the feature manifest on its own.
    pub fn load_features(&self) -> Result<FeatureManifest, ArtifactError> {
        let bytes = read(&self.features_path)?;
        let manifest: FeatureManifest =
            serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Corrupt {
                path: self.features_path.display().to_string(),
                message: e.to_string(),
            })?;
        check_schema(manifest.schema_version)?;
        Ok(manifest)
    }

    /// Load the model and verify it against its manifest.
    ///
    /// The feature order embedded in the model is what serving uses. A
    /// manifest for the same model must agree with it; a missing manifest or
    /// one left over from the previous model is logged and skipped.
    pub fn load(&self) -> Result<TrainedModel, ArtifactError> {
        let bytes = read(&self.model_path)?;
        let envelope: ModelEnvelope<TrainedModel> =
            bincode::deserialize(&bytes).map_err(|e| ArtifactError::Corrupt {
                path: self.model_path.display().to_string(),
                message: e.to_string(),
            })?;
        check_schema(envelope.schema_version)?;
        let model = envelope.model;

        if let Some(unknown) = model
            .metadata
            .feature_names
            .iter()
            .find(|name| !is_known_feature(name))
        {
            return Err(ArtifactError::UnknownFeature(unknown.clone()));
        }

        match self.load_features() {
            Ok(manifest) if manifest.model_id == model.metadata.model_id => {
                if manifest.feature_names != model.metadata.feature_names {
                    return Err(ArtifactError::FeatureMismatch {
                        model: model.metadata.feature_names.clone(),
                        manifest: manifest.feature_names,
                    });
                }
            }
            Ok(manifest) => warn!(
                model_id = %model.metadata.model_id,
                manifest_model_id = %manifest.model_id,
                "feature manifest is stale, using features embedded in the model"
            ),
            Err(ArtifactError::Missing(path)) => warn!(
                %path,
                "feature manifest missing, using features embedded in the model"
            ),
            Err(e) => return Err(e),
        }

        Ok(model)
    }
}

fn check_schema(found: u32) -> Result<(), ArtifactError> {
    if found != ARTIFACT_SCHEMA_VERSION {
        return Err(ArtifactError::SchemaVersion {
            found,
            expected: ARTIFACT_SCHEMA_VERSION,
        });
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path.display().to_string())
        } else {
            ArtifactError::Io {
                path: path.display().to_string(),
                source,
            }
        }
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::feature_names;
    use crate::ml::{
        gbm::GradientBoostedTrees, FeatureVector, Hyperparameters, MLModel, ModelMetadata,
        ModelType, ValidationMetrics,
    };
    use tokio_util::sync::CancellationToken;

    fn small_model() -> TrainedModel {
        let x: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64, (i * 2) as f64, i as f64 + 0.5, (i % 52 + 1) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] * 3.0).collect();
        let hp = Hyperparameters {
            n_estimators: 10,
            learning_rate: 0.3,
            random_state: 7,
            max_depth: 2,
            subsample: 1.0,
        };
        let gbm = GradientBoostedTrees::fit(&x, &y, &hp, &CancellationToken::new()).unwrap();
        let metadata = ModelMetadata {
            model_id: "test-model".to_string(),
            model_type: ModelType::GradientBoosting,
            trained_at: chrono::Utc::now(),
            training_samples: x.len(),
            validation_metrics: ValidationMetrics::new(0.0, 0.0, 0.0, 1.0),
            feature_names: feature_names(),
        };
        TrainedModel::new(gbm, hp, metadata)
    }

    fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(dir.join("models/model.bin"), dir.join("models/features.json"))
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let model = small_model();
        store.save(&model).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.metadata, model.metadata);
        assert_eq!(loaded.hyperparameters, model.hyperparameters);

        let fv = FeatureVector::new(vec![3.0, 6.0, 3.5, 4.0], feature_names()).unwrap();
        assert_eq!(loaded.predict(&fv).unwrap(), model.predict(&fv).unwrap());
    }

    #[test]
    fn test_feature_manifest_loads_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();

        let manifest = store.load_features().unwrap();
        assert_eq!(manifest.feature_names, feature_names());
        assert_eq!(manifest.schema_version, ARTIFACT_SCHEMA_VERSION);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(store(dir.path()).load(), Err(ArtifactError::Missing(_))));
    }

    #[test]
    fn test_corrupt_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();
        fs::write(store.model_path(), b"not a model").unwrap();
        assert!(matches!(store.load(), Err(ArtifactError::Corrupt { .. })));
    }

    #[test]
    fn test_reordered_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();

        let mut manifest = store.load_features().unwrap();
        manifest.feature_names.swap(0, 1);
        fs::write(store.features_path(), serde_json::to_vec(&manifest).unwrap()).unwrap();

        assert!(matches!(store.load(), Err(ArtifactError::FeatureMismatch { .. })));
    }

    #[test]
    fn test_future_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();

        let mut manifest = store.load_features().unwrap();
        manifest.schema_version = ARTIFACT_SCHEMA_VERSION + 1;
        fs::write(store.features_path(), serde_json::to_vec(&manifest).unwrap()).unwrap();

        assert!(matches!(
            store.load_features(),
            Err(ArtifactError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn test_load_during_publish_sees_new_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut old = small_model();
        old.metadata.model_id = "old".to_string();
        store.save(&old).unwrap();

        // Model file replaced, manifest still describes "old".
        let mut new = small_model();
        new.metadata.model_id = "new".to_string();
        store.write_model(&new).unwrap();
        assert_eq!(store.load_features().unwrap().model_id, "old");

        let loaded = store.load().unwrap();
        assert_eq!(loaded.metadata.model_id, "new");
        assert_eq!(loaded.metadata.feature_names, feature_names());

        store.write_manifest(&new).unwrap();
        assert_eq!(store.load().unwrap().metadata.model_id, "new");
    }

    #[test]
    fn test_missing_manifest_falls_back_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();
        fs::remove_file(store.features_path()).unwrap();

        assert_eq!(store.load().unwrap().metadata.model_id, "test-model");
    }

    #[test]
    fn test_save_replaces_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&small_model()).unwrap();

        let mut second = small_model();
        second.metadata.model_id = "second".to_string();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap().metadata.model_id, "second");
        let leftovers = fs::read_dir(dir.path().join("models")).unwrap().count();
        assert_eq!(leftovers, 2);
    }
}
