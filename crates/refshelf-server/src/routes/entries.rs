//! Entry collection and single-entry routes.
//!
//! - GET /libraries/{lib_id}/entries - Filtered listing in the negotiated format
//! - POST /libraries/{lib_id}/entries - Create an entry from a decoded body
//! - GET /libraries/{lib_id}/entries/{entry_id} - One entry, with `ETag`
//! - PUT /libraries/{lib_id}/entries/{entry_id} - Replace an entry (version required)
//! - DELETE /libraries/{lib_id}/entries/{entry_id} - Remove an entry (version required)

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
    routing::get,
};
use refshelf_core::{Entry, FieldProblem, ValidationError, Version, validate_entry};
use refshelf_store::EntryFilter;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ExpectedVersion, FormatParams, Params, RawBody, entry_id, header_str, library_id};
use crate::negotiate::Scope;
use crate::respond::{represent_entries, represent_entry};
use crate::routes::negotiate;
use crate::state::AppState;

/// Decodes a request body into an unstored entry.
fn decode_body(state: &AppState, headers: &HeaderMap, params: &FormatParams, body: &[u8]) -> ApiResult<Entry> {
    let format = state
        .negotiator()
        .body_format(header_str(headers, header::CONTENT_TYPE), params.format.as_deref())?;
    let codec = format
        .as_codec()
        .ok_or_else(|| ApiError::UnsupportedFormat(format!("cannot decode {}", format.name)))?;
    let mut entry = codec.decode_entry(body)?;
    entry.version = Version::UNSET;
    tracing::debug!(format = %format.name, entry = %entry.id, "Decoded request body");
    Ok(entry)
}

/// GET /libraries/{lib_id}/entries
async fn list_entries(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
    Params(filter): Params<EntryFilter>,
    Params(params): Params<FormatParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Any).await?;

    let entries = state.store().list(&library, &filter)?;
    let ids = entries.iter().map(|e| e.id.clone()).collect();
    represent_entries(&state, negotiated.for_entries(ids), entries, StatusCode::OK).await
}

/// POST /libraries/{lib_id}/entries
async fn create_entry(
    State(state): State<AppState>,
    Path(lib_id): Path<String>,
    Params(params): Params<FormatParams>,
    headers: HeaderMap,
    RawBody(body): RawBody,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Any).await?;

    let entry = decode_body(&state, &headers, &params, &body)?;
    validate_entry(&entry)?;
    let stored = state.store().insert(&library, entry)?;
    tracing::info!(library = %library, entry = %stored.id, "Entry created");

    let location = format!("/libraries/{}/entries/{}", library, stored.id);
    let request = negotiated.for_entries(vec![stored.id.clone()]);
    let mut response = represent_entry(&state, request, stored, StatusCode::CREATED).await?;
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

/// GET /libraries/{lib_id}/entries/{entry_id}
async fn get_entry(
    State(state): State<AppState>,
    Path((lib_id, key)): Path<(String, String)>,
    Params(params): Params<FormatParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Any).await?;

    let entry = state.store().get(&library, &id)?;
    represent_entry(&state, negotiated.for_entries(vec![id]), entry, StatusCode::OK).await
}

/// PUT /libraries/{lib_id}/entries/{entry_id}
///
/// The body replaces the whole entry. Its key must match the path: keys are
/// immutable once stored.
async fn update_entry(
    State(state): State<AppState>,
    Path((lib_id, key)): Path<(String, String)>,
    Params(params): Params<FormatParams>,
    ExpectedVersion(expected): ExpectedVersion,
    headers: HeaderMap,
    RawBody(body): RawBody,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;
    let negotiated = negotiate(&state, &params, &headers, Scope::Any).await?;

    let entry = decode_body(&state, &headers, &params, &body)?;
    if entry.id != id {
        return Err(ValidationError {
            missing: Vec::new(),
            invalid: vec![FieldProblem {
                field: "id".to_string(),
                reason: format!("entry id {} cannot be changed to {}", id, entry.id),
            }],
        }
        .into());
    }
    validate_entry(&entry)?;

    let stored = state.store().put(&library, entry, expected)?;
    tracing::info!(
        library = %library,
        entry = %stored.id,
        version = %stored.version,
        "Entry updated"
    );
    represent_entry(&state, negotiated.for_entries(vec![id]), stored, StatusCode::OK).await
}

/// DELETE /libraries/{lib_id}/entries/{entry_id}
async fn delete_entry(
    State(state): State<AppState>,
    Path((lib_id, key)): Path<(String, String)>,
    ExpectedVersion(expected): ExpectedVersion,
) -> ApiResult<StatusCode> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;

    state.store().delete(&library, &id, expected)?;
    tracing::info!(library = %library, entry = %id, "Entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build entry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/libraries/{lib_id}/entries",
            get(list_entries).post(create_entry),
        )
        .route(
            "/libraries/{lib_id}/entries/{entry_id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use refshelf_core::EntryId;

    use crate::routes::testing::{LIB, article, body_json, body_text, state_with};

    fn path(key: &str) -> Path<(String, String)> {
        Path((LIB.to_string(), key.to_string()))
    }

    fn params(format: &str) -> Params<FormatParams> {
        Params(FormatParams {
            format: Some(format.to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_get_entry_native() {
        let state = state_with(vec![article("e1", "A")]);
        let response = get_entry(State(state), path("e1"), params("native"), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "\"1\"");
        assert!(body_text(response).await.contains("title = {A}"));
    }

    #[tokio::test]
    async fn test_list_filters_by_text() {
        let state = state_with(vec![article("e1", "Alpha"), article("e2", "Beta")]);
        let filter = EntryFilter {
            text: Some("beta".to_string()),
            ..Default::default()
        };
        let response = list_entries(
            State(state),
            Path(LIB.to_string()),
            Params(filter),
            params("csl-json"),
            HeaderMap::new(),
        )
        .await
        .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "e2");
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_field() {
        let state = state_with(vec![]);
        let body = "@article{n1,\n  author = {Doe, Jane},\n  title = {T},\n  year = {2020},\n}\n";
        let err = create_entry(
            State(state),
            Path(LIB.to_string()),
            Params(FormatParams::default()),
            HeaderMap::new(),
            RawBody(Bytes::from(body)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
        assert_eq!(err.details().unwrap()["missing"][0], "journal");
    }

    #[tokio::test]
    async fn test_update_cannot_change_id() {
        let state = state_with(vec![article("e1", "A")]);
        let body = "@misc{other,\n  title = {B},\n}\n";
        let err = update_entry(
            State(state.clone()),
            path("e1"),
            Params(FormatParams::default()),
            ExpectedVersion(Version::INITIAL),
            HeaderMap::new(),
            RawBody(Bytes::from(body)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
        assert_eq!(err.details().unwrap()["invalid"][0]["field"], "id");

        let unchanged = state
            .store()
            .get(&library_id(LIB).unwrap(), &EntryId::new("e1").unwrap())
            .unwrap();
        assert_eq!(unchanged.version, Version::INITIAL);
    }

    #[tokio::test]
    async fn test_delete_with_stale_version_keeps_entry() {
        let state = state_with(vec![article("e1", "A")]);
        let err = delete_entry(State(state.clone()), path("e1"), ExpectedVersion(Version(5)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VersionConflict");

        let status = delete_entry(State(state), path("e1"), ExpectedVersion(Version::INITIAL))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
