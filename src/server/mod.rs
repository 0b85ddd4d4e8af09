//! HTTP surface for the analysis pipeline
//!
//! `POST /api/analyze` runs one analysis; `GET /health` reports liveness and
//! the configured summarization backend.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::analyze::{AnalyzeRequest, AnalyzeResponse, Analyzer};
use crate::AnalyzeError;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Error body returned by the API
pub enum ApiError {
    MissingUrl,
    InvalidBody(JsonRejection),
    Analyze(AnalyzeError),
}

impl From<AnalyzeError> for ApiError {
    fn from(e: AnalyzeError) -> Self {
        ApiError::Analyze(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingUrl => (StatusCode::BAD_REQUEST, "A YouTube URL is required".to_string()),
            ApiError::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Analyze(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Analyze(e) => {
                tracing::error!("Analysis failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/health", get(health))
        .with_state(state)
}

/// POST /api/analyze
async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::InvalidBody)?;
    if request.url.trim().is_empty() {
        return Err(ApiError::MissingUrl);
    }

    tracing::info!(
        "Analyze request for {} (speech fallback: {})",
        request.url,
        request.use_speech_fallback
    );
    let analysis = state.analyzer.analyze(&request).await?;
    Ok(Json(analysis.into()))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "backend": state.analyzer.backend_name(),
    }))
}

/// Serve the API until the process is stopped
pub async fn serve(analyzer: Analyzer, bind: &str) -> anyhow::Result<()> {
    let app = build_router(AppState::new(analyzer));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("recipe-scribe listening on http://{}", bind);
    tracing::info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;
    Ok(())
}
