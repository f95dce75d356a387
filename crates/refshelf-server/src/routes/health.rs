//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use refshelf_format::CacheStats;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Number of libraries served.
    pub libraries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_cache: Option<CacheStats>,
}

/// GET /health - Health check endpoint.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let libraries = state.store().libraries()?.len();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        libraries,
        style_cache: state.style_cache_stats(),
    }))
}

/// Build health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
