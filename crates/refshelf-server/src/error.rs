//! API error types with JSON responses.
//!
//! Every failure a handler can produce maps onto one error kind with a fixed
//! HTTP status. Only [`ApiError::Internal`] hides its message from the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use refshelf_core::{EntryId, EntryIdParseError, ValidationError, VersionParseError};
use refshelf_format::{CodecError, RenderError};
use refshelf_store::StoreError;
use serde::Serialize;
use serde_json::{Value, json};

/// API error that can be returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown library, entry or field (404).
    #[error("{0}")]
    NotFound(String),

    /// Some of the requested entries do not exist (404).
    #[error("entries not found: {}", join_ids(.0))]
    EntriesNotFound(Vec<EntryId>),

    /// Stale version token or identifier collision (409).
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    /// Undecodable body or bad request parameter (400).
    #[error("{message}")]
    MalformedInput {
        message: String,
        details: Option<Value>,
    },

    /// Well-formed entry that breaks validation rules (400).
    #[error("{0}")]
    ValidationFailed(ValidationError),

    /// No registered format satisfies the request (406).
    #[error("{0}")]
    UnsupportedFormat(String),

    /// The citation style cannot be resolved (422).
    #[error("unknown citation style: {0}")]
    UnsupportedStyle(String),

    /// Rendering failed for a reason other than style resolution (500).
    #[error("{0}")]
    Render(String),

    /// Unexpected failure; logged, never shown to the client (500).
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_ids(ids: &[EntryId]) -> String {
    ids.iter().map(EntryId::as_str).collect::<Vec<_>>().join(", ")
}

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
            details: None,
        }
    }

    /// Get the error kind reported in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::EntriesNotFound(_) => "NotFound",
            Self::Conflict { .. } => "VersionConflict",
            Self::MalformedInput { .. } => "MalformedInput",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::UnsupportedFormat(_) | Self::UnsupportedStyle(_) => "UnsupportedRepresentation",
            Self::Render(_) => "RenderError",
            Self::Internal(_) => "InternalFault",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::EntriesNotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::MalformedInput { .. } | Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedFormat(_) => StatusCode::NOT_ACCEPTABLE,
            Self::UnsupportedStyle(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Render(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured information for the `details` member.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::EntriesNotFound(ids) => Some(json!({
                "missing": ids.iter().map(EntryId::as_str).collect::<Vec<_>>(),
            })),
            Self::Conflict { details, .. } | Self::MalformedInput { details, .. } => {
                details.clone()
            }
            Self::ValidationFailed(error) => Some(json!({
                "missing": error.missing,
                "invalid": error.invalid,
            })),
            _ => None,
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Taxonomy tag, e.g. `NotFound` or `VersionConflict`.
    pub error_kind: &'static str,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal fault");
                "internal server error".to_string()
            }
            other => {
                tracing::debug!(kind = other.kind(), error = %other, "Request rejected");
                other.to_string()
            }
        };
        let body = ErrorBody {
            error_kind: self.kind(),
            message,
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LibraryNotFound(_) | StoreError::EntryNotFound { .. } => {
                Self::NotFound(e.to_string())
            }
            StoreError::DuplicateEntry { ref entry, .. } => Self::Conflict {
                details: Some(json!({
                    "reason": "duplicateIdentifier",
                    "id": entry.as_str(),
                })),
                message: e.to_string(),
            },
            StoreError::VersionConflict {
                expected, actual, ..
            } => Self::Conflict {
                details: Some(json!({
                    "reason": "staleVersion",
                    "expected": expected,
                    "current": actual,
                })),
                message: e.to_string(),
            },
            StoreError::DuplicateKeyInSource { .. } => Self::malformed(e.to_string()),
            StoreError::DuplicateLibrary(_) | StoreError::LockPoisoned => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        match &e {
            CodecError::Malformed(m) => Self::MalformedInput {
                message: e.to_string(),
                details: Some(json!({
                    "line": m.line,
                    "column": m.column,
                    "field": m.field,
                })),
            },
            CodecError::ExpectedSingleEntry { found } => Self::MalformedInput {
                message: e.to_string(),
                details: Some(json!({ "found": found })),
            },
            CodecError::Unencodable { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::ValidationFailed(e)
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::StyleNotFound(name) => Self::UnsupportedStyle(name),
            other => Self::Render(other.to_string()),
        }
    }
}

impl From<EntryIdParseError> for ApiError {
    fn from(e: EntryIdParseError) -> Self {
        Self::malformed(e.to_string())
    }
}

impl From<VersionParseError> for ApiError {
    fn from(e: VersionParseError) -> Self {
        Self::malformed(e.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use refshelf_core::{LibraryId, Version};
    use refshelf_format::Malformed;

    fn key(s: &str) -> EntryId {
        EntryId::new(s).unwrap()
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let not_found: ApiError = StoreError::LibraryNotFound(LibraryId::new("x")).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind(), "NotFound");

        let conflict: ApiError = StoreError::VersionConflict {
            entry: key("e1"),
            expected: Version(1),
            actual: Version(2),
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.details().unwrap()["current"], 2);

        let poisoned: ApiError = StoreError::LockPoisoned.into();
        assert_eq!(poisoned.kind(), "InternalFault");
    }

    #[test]
    fn test_duplicate_identifier_is_a_conflict_with_reason() {
        let error: ApiError = StoreError::DuplicateEntry {
            library: LibraryId::new("lib"),
            entry: key("e1"),
        }
        .into();
        assert_eq!(error.kind(), "VersionConflict");
        let details = error.details().unwrap();
        assert_eq!(details["reason"], "duplicateIdentifier");
        assert_eq!(details["id"], "e1");
    }

    #[test]
    fn test_malformed_codec_error_carries_location() {
        let error: ApiError =
            CodecError::from(Malformed::new("unexpected end").at(3, 7).in_field("title")).into();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        let details = error.details().unwrap();
        assert_eq!(details["line"], 3);
        assert_eq!(details["column"], 7);
        assert_eq!(details["field"], "title");
    }

    #[test]
    fn test_style_errors_are_unsupported_representation() {
        let style: ApiError = RenderError::StyleNotFound("nope".to_string()).into();
        assert_eq!(style.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(style.kind(), "UnsupportedRepresentation");

        let format = ApiError::UnsupportedFormat("application/pdf".to_string());
        assert_eq!(format.status_code(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(format.kind(), "UnsupportedRepresentation");

        let render: ApiError = RenderError::NoBibliographyLayout("x".to_string()).into();
        assert_eq!(render.kind(), "RenderError");
    }

    #[test]
    fn test_validation_details_list_missing_fields() {
        let error: ApiError = ValidationError {
            missing: vec!["journal".to_string()],
            invalid: vec![],
        }
        .into();
        assert_eq!(error.details().unwrap()["missing"][0], "journal");
    }

    #[tokio::test]
    async fn test_internal_fault_hides_message() {
        let response = ApiError::Internal("database path /secret".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errorKind"], "InternalFault");
        assert_eq!(body["message"], "internal server error");
        assert!(body.get("details").is_none());
    }
}
