//! Request extractors that reject with the API error taxonomy.
//!
//! axum's built-in extractors answer bad input with plain-text bodies; these
//! wrappers turn every rejection into a `MalformedInput` JSON error.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{HeaderMap, header, request::Parts},
};
use refshelf_core::{EntryId, LibraryId, Version};
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::ApiError;

/// Query string deserialized into `T`.
#[derive(Debug, Clone, Default)]
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Params(value))
            .map_err(|rejection| {
                ApiError::malformed(format!("invalid query string: {}", rejection.body_text()))
            })
    }
}

/// Representation parameters shared by every negotiated endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatParams {
    /// Format name, alias or media type.
    #[serde(default)]
    pub format: Option<String>,
    /// Citation style for rendered formats.
    #[serde(default)]
    pub style: Option<String>,
    /// `bibliography` or `inline`.
    #[serde(default)]
    pub mode: Option<String>,
}

/// The version a write is based on, from `If-Match` or `?version=`.
///
/// `If-Match` wins when both are present. Missing tokens are rejected:
/// writes without a version would silently overwrite concurrent changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedVersion(pub Version);

#[derive(Debug, Deserialize)]
struct VersionParam {
    #[serde(default)]
    version: Option<String>,
}

impl<S> FromRequestParts<S> for ExpectedVersion
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(header::IF_MATCH) {
            let token = value
                .to_str()
                .map_err(|_| ApiError::malformed("If-Match header contains invalid characters"))?;
            if token.trim() == "*" {
                return Err(ApiError::malformed(
                    "If-Match must name a version, not \"*\"",
                ));
            }
            return Ok(Self(Version::parse_token(token)?));
        }

        let Params(param) = Params::<VersionParam>::from_request_parts(parts, state).await?;
        match param.version {
            Some(token) => Ok(Self(Version::parse_token(&token)?)),
            None => Err(ApiError::malformed(
                "a version token is required: send If-Match or ?version=",
            )),
        }
    }
}

/// The raw request body, bounded by the configured body limit.
#[derive(Debug, Clone)]
pub struct RawBody(pub Bytes);

impl<S> FromRequest<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Bytes::from_request(req, state)
            .await
            .map(RawBody)
            .map_err(|rejection| {
                ApiError::malformed(format!("unreadable request body: {}", rejection.body_text()))
            })
    }
}

/// Value of a header as a string, if present and readable.
pub fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parses the library segment of a path.
pub fn library_id(raw: &str) -> Result<LibraryId, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::malformed("library id must not be empty"));
    }
    Ok(LibraryId::new(raw))
}

/// Parses an entry key from a path segment or list.
pub fn entry_id(raw: &str) -> Result<EntryId, ApiError> {
    EntryId::new(raw.trim()).map_err(|e| ApiError::malformed(format!("invalid entry id {:?}: {}", raw, e)))
}

/// Parses a comma-separated id list, keeping the first occurrence of each.
pub fn entry_ids(raw: &str) -> Result<Vec<EntryId>, ApiError> {
    let mut ids: Vec<EntryId> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = entry_id(part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ApiError::malformed("ids must name at least one entry"));
    }
    Ok(ids)
}

/// Validates a field name from a path segment and lowercases it.
pub fn field_name(raw: &str) -> Result<String, ApiError> {
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
    if !valid {
        return Err(ApiError::malformed(format!("invalid field name {:?}", raw)));
    }
    Ok(raw.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn expected_version(request: HttpRequest<()>) -> Result<ExpectedVersion, ApiError> {
        let (mut parts, _) = request.into_parts();
        ExpectedVersion::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_version_from_if_match() {
        let request = HttpRequest::builder()
            .uri("/x?version=9")
            .header("If-Match", "\"3\"")
            .body(())
            .unwrap();
        assert_eq!(expected_version(request).await.unwrap(), ExpectedVersion(Version(3)));
    }

    #[tokio::test]
    async fn test_version_from_query() {
        let request = HttpRequest::builder().uri("/x?version=2").body(()).unwrap();
        assert_eq!(expected_version(request).await.unwrap(), ExpectedVersion(Version(2)));
    }

    #[tokio::test]
    async fn test_missing_or_bad_version_is_malformed() {
        let missing = HttpRequest::builder().uri("/x").body(()).unwrap();
        assert_eq!(expected_version(missing).await.unwrap_err().kind(), "MalformedInput");

        let bad = HttpRequest::builder()
            .uri("/x")
            .header("If-Match", "abc")
            .body(())
            .unwrap();
        assert_eq!(expected_version(bad).await.unwrap_err().kind(), "MalformedInput");

        let star = HttpRequest::builder()
            .uri("/x")
            .header("If-Match", "*")
            .body(())
            .unwrap();
        assert!(expected_version(star).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_query_is_malformed() {
        #[derive(Debug, Deserialize)]
        struct Paging {
            #[allow(dead_code)]
            limit: Option<usize>,
        }
        let (mut parts, _) = HttpRequest::builder()
            .uri("/x?limit=lots")
            .body(())
            .unwrap()
            .into_parts();
        let err = Params::<Paging>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");
    }

    #[test]
    fn test_entry_ids_dedupes_in_order() {
        let ids = entry_ids("b, a,b,,c").unwrap();
        let keys: Vec<&str> = ids.iter().map(EntryId::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert!(entry_ids(" , ").is_err());
        assert!(entry_ids("a b").is_err());
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("Title").unwrap(), "title");
        assert!(field_name("bad field").is_err());
        assert!(field_name("").is_err());
    }
}
