//! Response bodies for negotiated representations.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use refshelf_core::{Entry, Version};
use refshelf_format::{RenderOutput, RenderedLayout};

use crate::error::ApiError;
use crate::negotiate::RenderRequest;
use crate::state::AppState;

/// Header carrying the number of entries that rendered with problems.
pub const RENDER_FAILURES_HEADER: &str = "x-render-failures";

fn content_type(media_type: &str) -> HeaderValue {
    let value = if media_type.starts_with("text/") {
        format!("{}; charset=utf-8", media_type)
    } else {
        media_type.to_string()
    };
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

/// Adds an `ETag` for the given version.
pub fn with_etag(mut response: Response, version: Version) -> Response {
    if let Ok(value) = HeaderValue::from_str(&version.to_etag()) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// Encodes or renders a single entry. Codecs write it as one object, not a
/// collection.
pub async fn represent_entry(
    state: &AppState,
    request: RenderRequest,
    entry: Entry,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let version = entry.version;
    let response = represent(state, request, vec![entry], true, status).await?;
    Ok(with_etag(response, version))
}

/// Encodes or renders a collection of entries, in the order of `request.ids`.
pub async fn represent_entries(
    state: &AppState,
    request: RenderRequest,
    entries: Vec<Entry>,
    status: StatusCode,
) -> Result<Response, ApiError> {
    represent(state, request, entries, false, status).await
}

async fn represent(
    state: &AppState,
    request: RenderRequest,
    entries: Vec<Entry>,
    single: bool,
    status: StatusCode,
) -> Result<Response, ApiError> {
    if let Some((layout, style)) = request.rendered() {
        let style = style.clone();
        let output = state.renderer().render(entries, style, request.mode).await?;
        return Ok(rendered(layout, &request.format.media_type, output, status));
    }

    let codec = request.format.as_codec().ok_or_else(|| {
        ApiError::Internal(format!("format {} has neither codec nor style", request.format.name))
    })?;
    let bytes = match entries.as_slice() {
        [entry] if single => codec.encode_entry(entry)?,
        many => codec.encode_entries(many)?,
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type(&request.format.media_type));
    Ok((status, headers, Body::from(bytes)).into_response())
}

fn rendered(layout: RenderedLayout, media_type: &str, output: RenderOutput, status: StatusCode) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type(media_type));
    headers.insert(RENDER_FAILURES_HEADER, HeaderValue::from(output.failures.len()));

    let body = match layout {
        RenderedLayout::Envelope => match serde_json::to_vec(&output) {
            Ok(json) => json,
            Err(e) => return ApiError::Internal(format!("failed to serialize citation: {}", e)).into_response(),
        },
        RenderedLayout::PlainText => output.text.into_bytes(),
    };
    (status, headers, Body::from(body)).into_response()
}
