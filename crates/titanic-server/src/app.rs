//! Shared application state and router construction.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use titanic_core::{ServiceConfig, TitanicError};
use titanic_features::{EncodingPipeline, Preprocessor};
use titanic_model::ModelManager;
use tracing::{info, warn};

use crate::api::{health_handler, history_handler, load_handler, predict_handler};
use crate::history::PredictionHistory;

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServiceConfig,
    pub models: ModelManager,
    pub preprocessor: Preprocessor,
    pub history: PredictionHistory,
}

impl AppState {
    /// Assemble state around an existing preprocessor. No model is loaded.
    pub fn new(config: ServiceConfig, preprocessor: Preprocessor) -> Self {
        Self {
            models: ModelManager::new(config.model_path.clone()),
            history: PredictionHistory::new(config.history.view_limit),
            preprocessor,
            config,
        }
    }
}

/// Build the shared [`AppState`], loading both artifacts from the configured
/// paths.
///
/// A missing or broken encoding pipeline falls back to
/// [`EncodingPipeline::standard`]. A classifier that fails to load leaves the
/// service running without a model.
pub async fn build_app_state(config: ServiceConfig) -> Arc<AppState> {
    let pipeline_path = config.pipeline_path.clone();
    let loaded = tokio::task::spawn_blocking(move || Preprocessor::from_path(&pipeline_path))
        .await
        .unwrap_or_else(|e| Err(TitanicError::Load(format!("encoder load task failed: {e}"))));
    let preprocessor = match loaded {
        Ok(p) => {
            info!(
                path = %config.pipeline_path.display(),
                features = p.feature_names().len(),
                "Encoding pipeline loaded"
            );
            p
        }
        Err(e) => {
            warn!(
                path = %config.pipeline_path.display(),
                error = %e,
                "Failed to load encoding pipeline, using the standard encoder"
            );
            Preprocessor::new(EncodingPipeline::standard())
        }
    };

    let state = AppState::new(config, preprocessor);
    match state.models.load_default().await {
        Ok(model) => info!(
            model_version = model.pipeline.model_version(),
            "Model loaded at startup"
        ),
        Err(e @ TitanicError::NotFound { .. }) => {
            warn!(error = %e, "No model at the default path, starting unloaded")
        }
        Err(e) => warn!(error = %e, "Failed to load model at startup, starting unloaded"),
    }
    Arc::new(state)
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/load", post(load_handler))
        .route("/history", get(history_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
