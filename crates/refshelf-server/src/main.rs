//! Entry point for the refshelf-server binary.

use std::sync::Arc;

use refshelf_server::{
    AppState, LogFormat, ServerConfig, build_app, sources::load_libraries,
};
use refshelf_store::MemoryStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    tracing::info!("Starting refshelf-server");
    tracing::info!(
        "Configuration: addr={}, default_format={}, default_style={}, strict_accept={}",
        config.socket_addr(),
        config.default_format,
        config.default_style,
        config.strict_accept
    );

    // Load libraries
    let store = MemoryStore::new();
    let loaded = load_libraries(&store, &config.library_paths)?;
    for metadata in &loaded {
        tracing::info!(
            library = %metadata.id,
            entries = metadata.entry_count,
            encoding = %metadata.encoding,
            "Loaded library"
        );
    }
    if loaded.is_empty() {
        tracing::warn!("No libraries configured; set LIBRARY_PATHS to serve .bib files");
    }

    // Build application state and router
    let addr = config.socket_addr();
    let state = AppState::build(Arc::new(store), config)?;
    let app = build_app(state);

    // Create listener
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
