//! refshelf-server: HTTP API over in-memory bibliographic libraries
//!
//! This crate provides:
//! - REST endpoints for libraries, entries, single fields and citations
//! - Content negotiation across codecs and rendered citation formats
//! - Optimistic concurrency through entry versions and `ETag`/`If-Match`
//! - A JSON error taxonomy shared by every endpoint
//!
//! # Architecture
//!
//! The server is built on Axum with a middleware stack for:
//! - Request ID generation and propagation
//! - Request tracing and logging
//! - CORS handling
//! - A global bound on in-flight requests and on body size
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use refshelf_server::{AppState, ServerConfig, build_app, sources::load_libraries};
//! use refshelf_store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     let store = MemoryStore::new();
//!     load_libraries(&store, &config.library_paths)?;
//!     let addr = config.socket_addr();
//!     let app = build_app(AppState::build(Arc::new(store), config)?);
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod negotiate;
pub mod render;
pub mod respond;
pub mod routes;
pub mod sources;
pub mod state;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Request, header},
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::{REQUEST_ID_HEADER, propagate_request_id, request_id, request_id_layer};
use crate::respond::RENDER_FAILURES_HEADER;

// Re-exports for convenience
pub use config::{ConfigError, CorsOrigins, LogFormat, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

// Re-export dependent crates
pub use refshelf_core;
pub use refshelf_format;
pub use refshelf_store;

/// Build the router with the full middleware stack.
///
/// Request IDs are assigned outermost so the trace span and every log line
/// of a request carry the same id.
pub fn build_app(state: AppState) -> Router {
    let config = state.config().clone();

    routes::build_router(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(SetResponseHeaderLayer::appending(
            header::VARY,
            HeaderValue::from_static("accept"),
        ))
        .layer(axum::middleware::from_fn(propagate_request_id))
        .layer(GlobalConcurrencyLimitLayer::new(config.max_concurrent_requests))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id(request).unwrap_or("-"),
                )
            }),
        )
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(request_id_layer())
}

/// Build the CORS layer from configuration.
fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => AllowOrigin::list(list.iter().cloned()),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::ETAG,
            header::LOCATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(RENDER_FAILURES_HEADER),
        ])
}
