//! Application state shared across handlers.

use std::sync::Arc;

use refshelf_format::{
    BuiltinCatalog, CacheConfig, CacheStats, CitationEngine, DirectoryCatalog, FormatRegistry,
    LayeredCatalog, StyleCatalog,
};
use refshelf_store::LibraryAccessor;

use crate::config::{ConfigError, ServerConfig};
use crate::negotiate::Negotiator;
use crate::render::Renderer;

/// Application state shared across all handlers.
///
/// Everything is assembled once at startup; the registry and style catalog
/// are read-only afterwards. This is cloneable and can be extracted in
/// handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Library accessor.
    store: Arc<dyn LibraryAccessor>,
    /// Server configuration.
    config: Arc<ServerConfig>,
    negotiator: Negotiator,
    renderer: Renderer,
    /// Present when styles are also loaded from a directory.
    directory_styles: Option<DirectoryCatalog>,
}

impl AppState {
    /// Builds the registry, style catalog and engine described by `config`.
    pub fn build(store: Arc<dyn LibraryAccessor>, config: ServerConfig) -> Result<Self, ConfigError> {
        let registry = FormatRegistry::with_defaults(&config.default_format).map_err(|e| {
            ConfigError::InvalidValue {
                name: "DEFAULT_FORMAT".to_string(),
                reason: e.to_string(),
            }
        })?;

        let builtin: Arc<dyn StyleCatalog> =
            Arc::new(BuiltinCatalog::load().map_err(ConfigError::BuiltinStyles)?);
        let directory_styles = match &config.styles_dir {
            Some(dir) if !dir.is_dir() => {
                return Err(ConfigError::InvalidValue {
                    name: "STYLES_DIR".to_string(),
                    reason: format!("{} is not a directory", dir.display()),
                });
            }
            Some(dir) => Some(DirectoryCatalog::new(
                dir.clone(),
                CacheConfig::new(config.style_cache_ttl),
            )),
            None => None,
        };
        let catalog: Arc<dyn StyleCatalog> = match &directory_styles {
            Some(dir) => Arc::new(
                LayeredCatalog::new()
                    .with_layer(Arc::new(dir.clone()))
                    .with_layer(builtin),
            ),
            None => builtin,
        };

        if catalog.resolve_style(&config.default_style).is_none() {
            return Err(ConfigError::InvalidValue {
                name: "DEFAULT_STYLE".to_string(),
                reason: format!(
                    "style {:?} not found; available: {}",
                    config.default_style,
                    catalog.available().join(", ")
                ),
            });
        }

        tracing::info!(
            default_format = %registry.default_format().name,
            default_style = %config.default_style,
            styles = catalog.available().len(),
            "Formats and styles ready"
        );

        let negotiator = Negotiator::new(
            Arc::new(registry),
            config.prefer_accept_header,
            config.strict_accept,
            config.default_style.clone(),
        );
        let renderer = Renderer::new(CitationEngine::new(catalog), config.render_timeout);

        Ok(Self {
            store,
            config: Arc::new(config),
            negotiator,
            renderer,
            directory_styles,
        })
    }

    /// Get a reference to the library accessor.
    pub fn store(&self) -> &dyn LibraryAccessor {
        self.store.as_ref()
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Statistics of the directory style cache, if one is configured.
    pub fn style_cache_stats(&self) -> Option<CacheStats> {
        self.directory_styles.as_ref().map(|d| d.cache().stats())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("negotiator", &self.negotiator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refshelf_store::MemoryStore;

    fn build(config: ServerConfig) -> Result<AppState, ConfigError> {
        AppState::build(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn test_defaults_build() {
        let state = build(ServerConfig::default()).unwrap();
        assert_eq!(state.negotiator().registry().default_format().name, "bibtex");
        assert!(state.style_cache_stats().is_none());
    }

    #[test]
    fn test_rendered_default_format_is_rejected() {
        let config = ServerConfig {
            default_format: "citation".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            build(config),
            Err(ConfigError::InvalidValue { name, .. }) if name == "DEFAULT_FORMAT"
        ));
    }

    #[test]
    fn test_unknown_default_style_is_rejected() {
        let config = ServerConfig {
            default_style: "harvard-nonexistent".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            build(config),
            Err(ConfigError::InvalidValue { name, .. }) if name == "DEFAULT_STYLE"
        ));
    }

    #[test]
    fn test_styles_dir_layered_over_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            styles_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        };
        let state = build(config).unwrap();
        assert!(state.renderer().engine().resolve("ieee").is_ok());
        assert!(state.style_cache_stats().is_some());
    }
}
