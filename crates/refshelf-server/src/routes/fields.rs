//! Single-field routes.
//!
//! - GET /libraries/{lib_id}/entries/{entry_id}/fields/{field} - Value as text/plain
//! - PUT /libraries/{lib_id}/entries/{entry_id}/fields/{field} - Set (or clear with an empty body)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use refshelf_core::{Entry, validate_entry};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ExpectedVersion, RawBody, entry_id, field_name, library_id};
use crate::respond::with_etag;
use crate::state::AppState;

type FieldPath = Path<(String, String, String)>;

/// GET /libraries/{lib_id}/entries/{entry_id}/fields/{field}
async fn get_field(
    State(state): State<AppState>,
    Path((lib_id, key, field)): FieldPath,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;
    let field = field_name(&field)?;

    let entry = state.store().get(&library, &id)?;
    let value = entry
        .field(&field)
        .ok_or_else(|| ApiError::NotFound(format!("field {} is not set on entry {}", field, id)))?
        .to_string();

    let response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        value,
    )
        .into_response();
    Ok(with_etag(response, entry.version))
}

/// PUT /libraries/{lib_id}/entries/{entry_id}/fields/{field}
///
/// The body is the new value; trailing line breaks are dropped. The updated
/// entry must still pass validation.
async fn put_field(
    State(state): State<AppState>,
    Path((lib_id, key, field)): FieldPath,
    ExpectedVersion(expected): ExpectedVersion,
    RawBody(body): RawBody,
) -> ApiResult<Response> {
    let library = library_id(&lib_id)?;
    let id = entry_id(&key)?;
    let field = field_name(&field)?;
    let value = std::str::from_utf8(&body)
        .map_err(|_| ApiError::malformed("field value must be UTF-8 text"))?
        .trim_end_matches(['\r', '\n']);

    let mut entry = state.store().get(&library, &id)?;
    if value.is_empty() {
        entry.fields.remove(&field);
    } else {
        entry.fields.set(&field, value);
    }
    validate_entry(&entry)?;

    let stored: Entry = state.store().put(&library, entry, expected)?;
    tracing::info!(
        library = %library,
        entry = %stored.id,
        field = %field,
        version = %stored.version,
        "Field updated"
    );
    let version = stored.version;
    Ok(with_etag(Json(stored).into_response(), version))
}

/// Build field routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/libraries/{lib_id}/entries/{entry_id}/fields/{field}",
        get(get_field).put(put_field),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use refshelf_core::Version;

    use crate::routes::testing::{LIB, article, body_json, body_text, state_with};

    fn field_path(key: &str, field: &str) -> FieldPath {
        Path((LIB.to_string(), key.to_string(), field.to_string()))
    }

    #[tokio::test]
    async fn test_get_field() {
        let state = state_with(vec![article("e1", "A")]);
        let response = get_field(State(state.clone()), field_path("e1", "Title"))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ETAG], "\"1\"");
        assert_eq!(body_text(response).await, "A");

        let err = get_field(State(state), field_path("e1", "isbn"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_field_bumps_version() {
        let state = state_with(vec![article("e1", "A")]);
        let response = put_field(
            State(state.clone()),
            field_path("e1", "title"),
            ExpectedVersion(Version::INITIAL),
            RawBody(Bytes::from("New title\n")),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::ETAG], "\"2\"");
        let body = body_json(response).await;
        assert_eq!(body["version"], 2);
        assert_eq!(body["fields"]["title"], "New title");

        let stale = put_field(
            State(state),
            field_path("e1", "title"),
            ExpectedVersion(Version::INITIAL),
            RawBody(Bytes::from("Again")),
        )
        .await
        .unwrap_err();
        assert_eq!(stale.kind(), "VersionConflict");
    }

    #[tokio::test]
    async fn test_clearing_required_field_fails_validation() {
        let state = state_with(vec![article("e1", "A")]);
        let err = put_field(
            State(state),
            field_path("e1", "journal"),
            ExpectedVersion(Version::INITIAL),
            RawBody(Bytes::new()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
        assert_eq!(err.details().unwrap()["missing"][0], "journal");
    }
}
