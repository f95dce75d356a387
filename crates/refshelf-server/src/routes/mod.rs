//! Route definitions for the HTTP API.

pub mod citations;
pub mod entries;
pub mod fields;
pub mod health;
pub mod libraries;

use axum::{Router, http::HeaderMap, http::Uri, http::header};

use crate::error::{ApiError, ApiResult};
use crate::extract::{FormatParams, header_str};
use crate::negotiate::{Negotiated, Scope};
use crate::state::AppState;

/// Build the complete router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(libraries::routes())
        .merge(entries::routes())
        .merge(citations::routes())
        .merge(fields::routes())
        .fallback(unknown_route)
        .with_state(state)
}

async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no resource at {}", uri.path()))
}

/// Negotiates the response representation and resolves its style.
///
/// Runs before the handler touches the library, so an unsupported
/// representation never leaves a half-applied mutation behind.
pub(crate) async fn negotiate(
    state: &AppState,
    params: &FormatParams,
    headers: &HeaderMap,
    scope: Scope,
) -> ApiResult<Negotiated> {
    let selection = state.negotiator().select(
        params.format.as_deref(),
        header_str(headers, header::ACCEPT),
        params.style.as_deref(),
        params.mode.as_deref(),
        scope,
    )?;
    let style = match &selection.style {
        Some(name) => Some(state.renderer().resolve_style(name).await?),
        None => None,
    };
    Ok(Negotiated {
        format: selection.format,
        style,
        mode: selection.mode,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the route tests.

    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::response::Response;
    use refshelf_core::{Entry, EntryId, EntryType, Library, LibraryId, LibraryMetadata};
    use refshelf_store::MemoryStore;
    use serde_json::Value;

    use crate::config::ServerConfig;
    use crate::state::AppState;

    pub const LIB: &str = "refs";

    pub fn state_with(entries: Vec<Entry>) -> AppState {
        let store = MemoryStore::new();
        store
            .register(Library::new(
                LibraryMetadata::new(LibraryId::new(LIB), LIB),
                entries,
            ))
            .unwrap();
        AppState::build(Arc::new(store), ServerConfig::default()).unwrap()
    }

    pub fn article(id: &str, title: &str) -> Entry {
        Entry::new(EntryId::new(id).unwrap(), EntryType::Article)
            .with_field("author", "Doe, Jane")
            .with_field("title", title)
            .with_field("journal", "Journal of Tests")
            .with_field("year", "2020")
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}
