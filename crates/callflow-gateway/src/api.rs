//! HTTP handlers: `POST /call`, `GET /health` and, with the `metrics`
//! feature, `GET /metrics`.

use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error};

use callflow_pipeline::{HealthState, PipelineError, ProviderHealth};

use crate::state::GatewayState;

/// Multipart field carrying the caller's audio.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("upload rejected: {0}")]
    Upload(#[from] MultipartError),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("{0}")]
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(e) => e.status(),
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub providers: ProviderHealth,
    pub timestamp: String,
}

/// `POST /call`: run the uploaded audio through the pipeline and answer
/// with the synthesized reply.
pub async fn call_handler(
    State(state): State<Arc<GatewayState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let audio = read_upload(&mut multipart).await?;
    debug!(bytes = audio.len(), "Received call audio");

    #[cfg(feature = "metrics")]
    let started = Instant::now();

    let result = state
        .pipeline
        .handle_call_cancellable(audio, &state.shutdown)
        .await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_call(
        result.as_ref().err().map(PipelineError::stage),
        started.elapsed().as_secs_f64(),
    );

    match result {
        Ok(speech) => {
            let content_type = state.pipeline.media_type().to_string();
            Ok(([(header::CONTENT_TYPE, content_type)], speech).into_response())
        }
        Err(PipelineError::Cancelled) => Err(ApiError::ShuttingDown),
        Err(e) => {
            error!(stage = e.stage(), "Call failed: {e}");
            Err(ApiError::Internal("Call processing failed"))
        }
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::BadRequest(format!(
        "missing '{UPLOAD_FIELD}' field in upload"
    )))
}

/// `GET /health`: probe every provider and report the aggregate.
///
/// A degraded provider is still a 200 response. Only a failure of the
/// aggregation itself yields 500.
pub async fn health_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<HealthReport>, ApiError> {
    let pipeline = state.pipeline.clone();
    let providers =
        joined_health(tokio::spawn(async move { pipeline.health_check().await }).await)?;

    #[cfg(feature = "metrics")]
    crate::metrics::record_health(providers.is_healthy());

    Ok(Json(HealthReport {
        status: providers.status(),
        providers,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Last-resort guard for the spawned aggregation task. Provider panics are
/// already caught per provider, so this only fires if the task itself is
/// aborted or panics outside a provider.
fn joined_health(result: Result<ProviderHealth, JoinError>) -> Result<ProviderHealth, ApiError> {
    result.map_err(|e| {
        error!("Health check failed: {e}");
        ApiError::Internal("Health check failed")
    })
}

#[cfg(feature = "metrics")]
pub async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
