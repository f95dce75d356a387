//! Library discovery and reload routes.
//!
//! - GET /libraries - Metadata of every served library
//! - GET /libraries/{lib_id} - Metadata of one library
//! - POST /libraries/{lib_id}/reload - Re-read a library from its file

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use refshelf_core::LibraryMetadata;

use crate::error::{ApiError, ApiResult};
use crate::extract::library_id;
use crate::sources::reload_library;
use crate::state::AppState;

/// GET /libraries
async fn list_libraries(State(state): State<AppState>) -> ApiResult<Json<Vec<LibraryMetadata>>> {
    Ok(Json(state.store().libraries()?))
}

/// GET /libraries/{lib_id}
async fn get_library(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
) -> ApiResult<Json<LibraryMetadata>> {
    let id = library_id(&lib_id)?;
    Ok(Json(state.store().library(&id)?))
}

/// POST /libraries/{lib_id}/reload
///
/// Bumps the generation and drops cached style lookups, so styles added to
/// the styles directory since the last load become visible.
async fn reload(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
) -> ApiResult<Json<LibraryMetadata>> {
    let id = library_id(&lib_id)?;
    let worker = state.clone();
    let metadata = tokio::task::spawn_blocking(move || reload_library(worker.store(), &id))
        .await
        .map_err(|e| ApiError::Internal(format!("reload task failed: {}", e)))??;

    state.renderer().invalidate_styles();
    tracing::info!(
        library = %metadata.id,
        generation = metadata.generation,
        entries = metadata.entry_count,
        "Library reloaded"
    );
    Ok(Json(metadata))
}

/// Build library routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/libraries", get(list_libraries))
        .route("/libraries/{lib_id}", get(get_library))
        .route("/libraries/{lib_id}/reload", post(reload))
}
