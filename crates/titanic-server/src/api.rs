//! HTTP handlers for prediction, model upload, history and health.
//!
//! All handlers receive the shared [`AppState`] through axum's `State`
//! extractor. Errors are returned in the JSON envelope
//! `{"error": {"message": ..., "type": ...}}`.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use titanic_core::{PassengerRecord, TitanicError};
use tracing::{debug, error, info, warn};

use crate::app::AppState;

/// File suffix accepted by `POST /load`.
pub const MODEL_UPLOAD_SUFFIX: &str = ".json";

/// Multipart field carrying the uploaded artifact.
pub const MODEL_UPLOAD_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// `POST /predict` body. Age and fare are required at the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct PassengerPayload {
    #[serde(rename = "PassengerId")]
    pub passenger_id: i64,
    #[serde(rename = "Pclass")]
    pub pclass: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "SibSp")]
    pub sib_sp: u32,
    #[serde(rename = "Parch")]
    pub parch: u32,
    #[serde(rename = "Ticket")]
    pub ticket: String,
    #[serde(rename = "Fare")]
    pub fare: f64,
    #[serde(rename = "Cabin", default)]
    pub cabin: Option<String>,
    #[serde(rename = "Embarked", default)]
    pub embarked: Option<String>,
}

impl From<PassengerPayload> for PassengerRecord {
    fn from(p: PassengerPayload) -> Self {
        Self {
            passenger_id: p.passenger_id,
            pclass: p.pclass,
            name: p.name,
            sex: p.sex,
            age: Some(p.age),
            sib_sp: p.sib_sp,
            parch: p.parch,
            ticket: p.ticket,
            fare: Some(p.fare),
            cabin: p.cabin,
            embarked: p.embarked,
        }
    }
}

/// `POST /predict` response body.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    #[serde(rename = "PassengerId")]
    pub passenger_id: Option<i64>,
    pub prediction: u8,
    /// `[P(did not survive), P(survived)]`.
    pub probability: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Build a JSON error response.
fn api_error(status: StatusCode, message: &str) -> Response {
    let error_type = match status {
        StatusCode::SERVICE_UNAVAILABLE => "model_not_loaded",
        s if s.is_client_error() => "invalid_request_error",
        _ => "api_error",
    };
    let body = ApiError {
        error: ApiErrorDetail {
            message: message.to_string(),
            error_type: error_type.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

fn prediction_failed(err: &TitanicError) -> Response {
    match err {
        TitanicError::NotLoaded => api_error(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
        _ => {
            error!(error = %err, "Prediction failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Prediction failed: {err}"),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /predict`: engineer, encode and classify one passenger.
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PassengerPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return api_error(rejection.status(), &rejection.body_text()),
    };

    if !state.models.is_loaded().await {
        return prediction_failed(&TitanicError::NotLoaded);
    }

    let record = PassengerRecord::from(payload);
    info!(passenger_id = record.passenger_id, "Prediction request received");

    let row = match state.preprocessor.process(&record) {
        Ok(row) => row,
        Err(e) => return prediction_failed(&e),
    };
    debug!(passenger_id = record.passenger_id, features = row.len(), "Record encoded");

    let result = match state.models.predict(&row).await {
        Ok(result) => result,
        Err(e) => return prediction_failed(&e),
    };

    let response = PredictionResponse {
        passenger_id: result.passenger_id,
        prediction: result.label,
        probability: result.probabilities,
        timestamp: Utc::now(),
    };
    info!(
        passenger_id = record.passenger_id,
        prediction = response.prediction,
        probability = ?response.probability,
        "Prediction served"
    );

    state.history.record(record, response.clone()).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// `POST /load`: replace the active model with an uploaded artifact.
pub async fn load_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => return api_error(rejection.status(), &rejection.body_text()),
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return api_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Missing '{MODEL_UPLOAD_FIELD}' field"),
                )
            }
            Err(e) => return api_error(e.status(), &e.body_text()),
        };
        if field.name() != Some(MODEL_UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.ends_with(MODEL_UPLOAD_SUFFIX) {
            warn!(filename = %filename, "Rejected model upload with wrong suffix");
            return api_error(
                StatusCode::BAD_REQUEST,
                &format!("File must be a {MODEL_UPLOAD_SUFFIX} model artifact"),
            );
        }

        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => return api_error(e.status(), &e.body_text()),
        };

        return match state.models.load_from_bytes(bytes.to_vec()).await {
            Ok(model) => {
                if model.pipeline.schema.names.as_slice() != state.preprocessor.feature_names() {
                    warn!(
                        filename = %filename,
                        model_features = model.pipeline.schema.len(),
                        encoder_features = state.preprocessor.feature_names().len(),
                        "Uploaded model schema differs from the encoder output; predictions will fail"
                    );
                }
                info!(filename = %filename, "New model loaded");
                let body = serde_json::json!({
                    "message": format!("Model {filename} loaded successfully"),
                    "model_version": model.pipeline.model_version(),
                    "loaded_at": model.loaded_at,
                });
                (StatusCode::OK, Json(body)).into_response()
            }
            Err(e) => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to load model: {e}"),
            ),
        };
    }
}

/// `GET /history`: total count and the most recent predictions.
pub async fn history_handler(State(state): State<Arc<AppState>>) -> Response {
    let (total, entries) = state.history.snapshot().await;
    let body = serde_json::json!({
        "total_predictions": total,
        "history": entries,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /health`: liveness plus model status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let model = state.models.current().await;
    let body = serde_json::json!({
        "status": "ok",
        "model_loaded": model.is_some(),
        "model_version": model.as_ref().map(|m| m.pipeline.model_version()),
        "timestamp": Utc::now(),
        "total_predictions": state.history.total().await,
    });
    (StatusCode::OK, Json(body)).into_response()
}
