//! Rendered citation routes.
//!
//! - GET /libraries/{lib_id}/entries/{entry_id}/citation - One entry
//! - GET /libraries/{lib_id}/citations?ids=a,b - Several entries, in the given order
//!
//! Both accept `style`, `mode` and a rendered `format` (`citation` by default).

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
};
use refshelf_core::{Entry, EntryId, LibraryId};
use refshelf_store::{LibraryAccessor, StoreError};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::{FormatParams, Params, entry_id, entry_ids, library_id};
use crate::negotiate::Scope;
use crate::respond::represent_entries;
use crate::routes::negotiate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CitationsQuery {
    #[serde(default)]
    ids: Option<String>,
}

/// Fetches entries in the order given, reporting every missing id at once.
fn fetch_entries(store: &dyn LibraryAccessor, library: &LibraryId, ids: &[EntryId]) -> ApiResult<Vec<Entry>> {
    let mut entries = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for id in ids {
        match store.get(library, id) {
            Ok(entry) => entries.push(entry),
            Err(StoreError::EntryNotFound { .. }) => missing.push(id.clone()),
            Err(other) => return Err(other.into()),
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::EntriesNotFound(missing));
    }
    Ok(entries)
}

/// GET /libraries/{lib_id}/entries/{entry_id}/citation
async fn entry_citation(
    State(state): State<AppState>,
    Path((lib_id, key)): Path<(String, String)>,
    Params(params): Params<FormatParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Rendered).await?;

    let entry = state.store().get(&library, &id)?;
    represent_entries(&state, negotiated.for_entries(vec![id]), vec![entry], StatusCode::OK).await
}

/// GET /libraries/{lib_id}/citations?ids=a,b
async fn library_citations(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
    Params(query): Params<CitationsQuery>,
    Params(params): Params<FormatParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let ids = entry_ids(query.ids.as_deref().unwrap_or_default())?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Rendered).await?;

    let entries = fetch_entries(state.store(), &library, &ids)?;
    represent_entries(&state, negotiated.for_entries(ids), entries, StatusCode::OK).await
}

/// Build citation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/libraries/{lib_id}/entries/{entry_id}/citation",
            get(entry_citation),
        )
        .route("/libraries/{lib_id}/citations", get(library_citations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    use crate::respond::RENDER_FAILURES_HEADER;
    use crate::routes::testing::{LIB, article, body_json, body_text, state_with};

    fn format_params(format: Option<&str>, style: Option<&str>, mode: Option<&str>) -> Params<FormatParams> {
        Params(FormatParams {
            format: format.map(str::to_string),
            style: style.map(str::to_string),
            mode: mode.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_entry_citation_envelope_by_default() {
        let state = state_with(vec![article("e1", "A")]);
        let response = entry_citation(
            State(state),
            Path((LIB.to_string(), "e1".to_string())),
            format_params(None, None, Some("inline")),
            HeaderMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.refshelf.citation+json"
        );
        let body = body_json(response).await;
        assert_eq!(body["style"], "apa");
        assert_eq!(body["text"], "(Doe, 2020)");
        assert_eq!(body["items"][0]["id"], "e1");
    }

    #[tokio::test]
    async fn test_unknown_style_is_422() {
        let state = state_with(vec![article("e1", "A")]);
        let err = entry_citation(
            State(state),
            Path((LIB.to_string(), "e1".to_string())),
            format_params(None, Some("unknown-style"), None),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_codec_format_not_offered_for_citations() {
        let state = state_with(vec![article("e1", "A")]);
        let err = entry_citation(
            State(state),
            Path((LIB.to_string(), "e1".to_string())),
            format_params(Some("bibtex"), None, None),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_subset_in_request_order_as_text() {
        let state = state_with(vec![article("e1", "A"), article("e2", "B")]);
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain"));
        let response = library_citations(
            State(state),
            Path(LIB.to_string()),
            Params(CitationsQuery {
                ids: Some("e2,e1".to_string()),
            }),
            format_params(None, Some("ieee"), Some("inline")),
            headers,
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[RENDER_FAILURES_HEADER], "0");
        assert_eq!(body_text(response).await, "[1, 2]");
    }

    #[tokio::test]
    async fn test_missing_ids_are_listed() {
        let state = state_with(vec![article("e1", "A")]);
        let err = library_citations(
            State(state),
            Path(LIB.to_string()),
            Params(CitationsQuery {
                ids: Some("e1,x,y".to_string()),
            }),
            format_params(None, None, None),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.details().unwrap()["missing"], serde_json::json!(["x", "y"]));
    }
}
