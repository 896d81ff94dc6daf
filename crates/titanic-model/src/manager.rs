//! Hot-swappable model slot.
//!
//! [`ModelManager`] owns at most one [`LoadedModel`] at a time. Artifacts are
//! read and deserialized before the slot lock is taken, so a concurrent
//! prediction sees either the previous model or the new one, never a partial
//! state. A failed load leaves the current model in place.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use titanic_core::{EncodedRow, PredictionResult, Result, TitanicError};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::artifact::{ClassifierPipeline, FeatureTable};

/// Where the active model came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Upload,
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// A model installed in the manager.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub pipeline: ClassifierPipeline,
    pub source: ModelSource,
    pub loaded_at: DateTime<Utc>,
}

/// Holds the active classifier and serves predictions from it.
pub struct ModelManager {
    default_path: PathBuf,
    slot: RwLock<Option<Arc<LoadedModel>>>,
}

impl ModelManager {
    /// Create an empty manager. Nothing is loaded until [`load_default`] or
    /// [`load`] is called.
    ///
    /// [`load_default`]: Self::load_default
    /// [`load`]: Self::load
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
            slot: RwLock::new(None),
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Load the model at the configured default path.
    pub async fn load_default(&self) -> Result<Arc<LoadedModel>> {
        let path = self.default_path.clone();
        self.load(&path).await
    }

    /// Load the model at `path` and make it the active model.
    ///
    /// # Errors
    ///
    /// [`TitanicError::NotFound`] if `path` does not exist,
    /// [`TitanicError::Load`] if it cannot be checked, read, or is not a valid
    /// artifact.
    pub async fn load(&self, path: &Path) -> Result<Arc<LoadedModel>> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(TitanicError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(TitanicError::Load(format!(
                    "failed to stat {}: {e}",
                    path.display()
                )))
            }
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TitanicError::Load(format!("failed to read {}: {e}", path.display())))?;
        self.install(bytes, ModelSource::File(path.to_path_buf())).await
    }

    /// Deserialize an uploaded artifact and make it the active model.
    pub async fn load_from_bytes(&self, bytes: Vec<u8>) -> Result<Arc<LoadedModel>> {
        self.install(bytes, ModelSource::Upload).await
    }

    async fn install(&self, bytes: Vec<u8>, source: ModelSource) -> Result<Arc<LoadedModel>> {
        let size = bytes.len();
        let parsed = tokio::task::spawn_blocking(move || ClassifierPipeline::from_slice(&bytes))
            .await
            .map_err(|e| TitanicError::Load(format!("deserialization task failed: {e}")))?;
        let pipeline = match parsed {
            Ok(p) => p,
            Err(e) => {
                error!(source = %source, error = %e, "Failed to load model");
                return Err(e);
            }
        };

        let model = Arc::new(LoadedModel {
            pipeline,
            source,
            loaded_at: Utc::now(),
        });
        *self.slot.write().await = Some(Arc::clone(&model));
        info!(
            source = %model.source,
            model_version = model.pipeline.model_version(),
            features = model.pipeline.schema.len(),
            bytes = size,
            "Model loaded"
        );
        Ok(model)
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Snapshot of the active model, if any.
    pub async fn current(&self) -> Option<Arc<LoadedModel>> {
        self.slot.read().await.clone()
    }

    /// Predict a single encoded row with the active model.
    ///
    /// # Errors
    ///
    /// [`TitanicError::NotLoaded`] when no model is installed,
    /// [`TitanicError::SchemaMismatch`] when the row's features do not match
    /// the model's schema.
    pub async fn predict(&self, row: &EncodedRow) -> Result<PredictionResult> {
        let model = self.current().await.ok_or(TitanicError::NotLoaded)?;
        let table = FeatureTable::from_row(row);
        let label = model
            .pipeline
            .predict(&table)?
            .pop()
            .ok_or_else(|| TitanicError::Processing("model returned no label".to_string()))?;
        let probabilities = model
            .pipeline
            .predict_proba(&table)?
            .pop()
            .ok_or_else(|| TitanicError::Processing("model returned no probabilities".to_string()))?;
        Ok(PredictionResult {
            passenger_id: row.passenger_id,
            label,
            probabilities,
        })
    }
}

impl fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelManager")
            .field("default_path", &self.default_path)
            .finish_non_exhaustive()
    }
}
