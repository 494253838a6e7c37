// HTTP surface: health check, single and batch prediction.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::schema::{self, FieldError, PredictionResult, ValidationError};
use crate::service::{Health, PredictionService, ServiceError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    /// Body is not JSON at all, or has the wrong content type.
    MalformedBody { status: StatusCode, detail: String },
    Validation(Vec<FieldError>),
    ModelUnavailable(String),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::ModelUnavailable { .. } => ApiError::ModelUnavailable(e.to_string()),
            other => {
                error!("prediction failed: {other}");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::MalformedBody { status, detail } => (status, json!(detail)),
            ApiError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, json!(errors)),
            ApiError::ModelUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, json!(msg)),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!(msg)),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(service): State<Arc<PredictionService>>) -> Json<Health> {
    Json(service.health())
}

async fn predict(
    State(service): State<Arc<PredictionService>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(body) = payload?;
    let request = schema::parse_request(&body)?;
    let result = tokio::task::spawn_blocking(move || service.predict_one(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;
    Ok(Json(result))
}

async fn predict_batch(
    State(service): State<Arc<PredictionService>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>, ApiError> {
    let Json(body) = payload?;
    let requests = schema::parse_batch(&body)?;
    let results = tokio::task::spawn_blocking(move || service.predict_batch(&requests))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;
    Ok(Json(results))
}

/// Build the router around a service constructed once at startup.
pub fn router(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
