//! HTTP boundary.
//!
//! - `POST /check_ips`: body is a JSON array of address strings; the
//!   response maps each address to whether it is listed.
//! - `GET /health`: readiness and dataset information.

use ahash::AHashMap;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use thiserror::Error;

use crate::query::QueryService;
use crate::scheduler::RefreshScheduler;

/// Structured error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("empty ip list")]
    EmptyBatch,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::EmptyBatch => "EMPTY_BATCH",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::EmptyBatch => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::EmptyBatch => ApiError::EmptyBatch,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared handler state.
pub struct AppState {
    query: QueryService,
    scheduler: Option<Arc<RefreshScheduler>>,
}

impl AppState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            scheduler: None,
        }
    }

    /// State backed by a scheduler's published index, with its dataset
    /// information reported on `/health`.
    pub fn from_scheduler(scheduler: Arc<RefreshScheduler>) -> Self {
        Self {
            query: QueryService::new(scheduler.published()),
            scheduler: Some(scheduler),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub generation: u64,
    pub entries: usize,
    /// Unix seconds of the last successful refresh.
    pub last_updated: Option<u64>,
    pub source: Option<String>,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/check_ips", post(check_ips_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn check_ips_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AHashMap<String, bool>>, ApiError> {
    // Content type is not required; the body just has to be a JSON array.
    let addresses: Vec<String> = serde_json::from_slice(&body)?;
    let result = state.query.check_batch(&addresses)?;
    if result.malformed > 0 {
        log::debug!(
            "Batch of {} had {} malformed addresses",
            addresses.len(),
            result.malformed
        );
    }
    Ok(Json(result.results))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (ready, dataset) = match &state.scheduler {
        Some(scheduler) => (scheduler.is_ready(), Some(scheduler.dataset_state())),
        None => (true, None),
    };
    let last_updated = dataset
        .as_ref()
        .and_then(|d| d.last_updated)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    let snapshot = state.query.snapshot();
    let body = HealthResponse {
        status: if ready { "ok" } else { "bootstrapping" },
        generation: snapshot.generation(),
        entries: snapshot.network_count(),
        last_updated,
        source: dataset.and_then(|d| d.location),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on {}", addr);
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
