//! Command implementations for the refshelf CLI.
//!
//! Each command module provides:
//! - Args struct for clap argument parsing
//! - execute() function that performs the command
//! - Human-readable and JSON output formatting

pub mod add;
pub mod cite;
pub mod delete;
pub mod entries;
pub mod libraries;
pub mod reload;
pub mod set;
pub mod show;

use anyhow::Result;
use reqwest::header::{CONTENT_TYPE, ETAG};
use serde::{Deserialize, Serialize};

/// Common error type for HTTP requests.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status} {kind}): {message}")]
    Server {
        status: u16,
        kind: String,
        message: String,
    },
}

/// Error body returned by the server for every failed request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_kind: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// A non-JSON response body with the headers the commands care about.
#[derive(Debug)]
pub struct TextResponse {
    pub body: String,
    pub content_type: Option<String>,
    /// Entry version from the `ETag` header, without quotes.
    pub version: Option<String>,
}

/// Print output in JSON or human-readable format.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Trait for types that can be printed in human-readable format.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Send a request and decode a JSON success body.
pub async fn make_request<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CliError> {
    let response = check(request.send().await?).await?;
    Ok(response.json::<T>().await?)
}

/// Send a request and keep the success body as text.
pub async fn fetch_text(request: reqwest::RequestBuilder) -> Result<TextResponse, CliError> {
    let response = check(request.send().await?).await?;
    let headers = response.headers();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let version = headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_string());
    Ok(TextResponse {
        body: response.text().await?,
        content_type,
        version,
    })
}

/// Send a request whose success carries no body.
pub async fn send_empty(request: reqwest::RequestBuilder) -> Result<(), CliError> {
    check(request.send().await?).await?;
    Ok(())
}

/// Turn an error status into a `CliError::Server`.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error) => Err(CliError::Server {
            status: status.as_u16(),
            kind: error.error_kind,
            message: match error.details {
                Some(details) => format!("{} {}", error.message, details),
                None => error.message,
            },
        }),
        Err(_) => Err(CliError::Server {
            status: status.as_u16(),
            kind: "Unknown".to_string(),
            message: body,
        }),
    }
}

/// Read a body argument: `-` for stdin, `@path` or a plain path for a file.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        let path = source.strip_prefix('@').unwrap_or(source);
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Format a version for `If-Match`.
pub fn if_match(version: u64) -> String {
    format!("\"{}\"", version)
}

/// Format a timestamp for human display.
pub fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Truncate a string for display, adding ellipsis if needed.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
