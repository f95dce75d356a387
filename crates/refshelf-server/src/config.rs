//! Server configuration from environment variables.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use http::HeaderValue;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected text or json, got {:?}", other)),
        }
    }
}

/// Origins allowed by the CORS layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    #[default]
    Any,
    List(Vec<HeaderValue>),
}

impl FromStr for CorsOrigins {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "*" {
            return Ok(Self::Any);
        }
        let origins = s
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| HeaderValue::from_str(o).map_err(|_| format!("invalid origin {:?}", o)))
            .collect::<Result<Vec<_>, _>>()?;
        if origins.is_empty() {
            return Err("no origins given".to_string());
        }
        Ok(Self::List(origins))
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind; loopback unless configured otherwise.
    pub host: IpAddr,
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    pub log_format: LogFormat,
    pub cors_allowed_origins: CorsOrigins,
    /// `.bib` files loaded at startup.
    pub library_paths: Vec<PathBuf>,
    /// Directory of additional `<name>.json` style definitions.
    pub styles_dir: Option<PathBuf>,
    /// Format used when negotiation finds no preference.
    pub default_format: String,
    /// Style used for rendered formats when the request names none.
    pub default_style: String,
    /// Let the Accept header outrank the `format` query parameter.
    pub prefer_accept_header: bool,
    /// Answer 406 when an Accept header matches no registered format.
    pub strict_accept: bool,
    /// Bound on style resolution and rendering. `None` waits indefinitely.
    pub render_timeout: Option<Duration>,
    pub max_concurrent_requests: usize,
    pub max_body_bytes: usize,
    /// Lifetime of cached style lookups.
    pub style_cache_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 23119,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            cors_allowed_origins: CorsOrigins::Any,
            library_paths: Vec::new(),
            styles_dir: None,
            default_format: "bibtex".to_string(),
            default_style: "apa".to_string(),
            prefer_accept_header: false,
            strict_accept: true,
            render_timeout: None,
            max_concurrent_requests: 64,
            max_body_bytes: 1024 * 1024,
            style_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `HOST`, `PORT`: bind address (default: 127.0.0.1:23119)
    /// - `LOG_LEVEL`, `LOG_FORMAT`: logging (default: "info", "text")
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated origins or "*" (default: "*")
    /// - `LIBRARY_PATHS`: comma-separated `.bib` files
    /// - `STYLES_DIR`: directory of extra citation styles
    /// - `DEFAULT_FORMAT`, `DEFAULT_STYLE`: negotiation fallbacks (default: "bibtex", "apa")
    /// - `PREFER_ACCEPT_HEADER`, `STRICT_ACCEPT`: negotiation policy (default: false, true)
    /// - `RENDER_TIMEOUT_MS`: rendering bound (default: unbounded)
    /// - `MAX_CONCURRENT_REQUESTS`, `MAX_BODY_BYTES`: limits (default: 64, 1 MiB)
    /// - `STYLE_CACHE_TTL_SECS`: style cache lifetime (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let render_timeout = parse_var::<u64>(&var, "RENDER_TIMEOUT_MS")?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let max_concurrent_requests = parse_var(&var, "MAX_CONCURRENT_REQUESTS")?
            .unwrap_or(defaults.max_concurrent_requests);
        if max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_CONCURRENT_REQUESTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: parse_var(&var, "HOST")?.unwrap_or(defaults.host),
            port: parse_var(&var, "PORT")?.unwrap_or(defaults.port),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_var(&var, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            cors_allowed_origins: parse_var(&var, "CORS_ALLOWED_ORIGINS")?
                .unwrap_or(defaults.cors_allowed_origins),
            library_paths: var("LIBRARY_PATHS")
                .map(|paths| {
                    paths
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default(),
            styles_dir: var("STYLES_DIR").map(PathBuf::from),
            default_format: var("DEFAULT_FORMAT").unwrap_or(defaults.default_format),
            default_style: var("DEFAULT_STYLE").unwrap_or(defaults.default_style),
            prefer_accept_header: parse_bool(&var, "PREFER_ACCEPT_HEADER")?
                .unwrap_or(defaults.prefer_accept_header),
            strict_accept: parse_bool(&var, "STRICT_ACCEPT")?.unwrap_or(defaults.strict_accept),
            render_timeout,
            max_concurrent_requests,
            max_body_bytes: parse_var(&var, "MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes),
            style_cache_ttl: parse_var(&var, "STYLE_CACHE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.style_cache_ttl),
        })
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>, ConfigError> {
    var(name)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("expected a boolean, got {:?}", other),
            }),
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    /// The styles compiled into the binary failed to load.
    #[error("failed to load built-in styles: {0}")]
    BuiltinStyles(#[source] refshelf_format::StyleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config(&[]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:23119");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.cors_allowed_origins, CorsOrigins::Any);
        assert_eq!(config.default_format, "bibtex");
        assert_eq!(config.default_style, "apa");
        assert!(!config.prefer_accept_header);
        assert!(config.strict_accept);
        assert!(config.render_timeout.is_none());
        assert_eq!(config.max_concurrent_requests, 64);
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.style_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("LIBRARY_PATHS", "/a/refs.bib, /b/more.bib,"),
            ("STYLES_DIR", "/styles"),
            ("PREFER_ACCEPT_HEADER", "yes"),
            ("STRICT_ACCEPT", "false"),
            ("RENDER_TIMEOUT_MS", "250"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, https://example.org"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.library_paths,
            vec![PathBuf::from("/a/refs.bib"), PathBuf::from("/b/more.bib")]
        );
        assert_eq!(config.styles_dir, Some(PathBuf::from("/styles")));
        assert!(config.prefer_accept_header);
        assert!(!config.strict_accept);
        assert_eq!(config.render_timeout, Some(Duration::from_millis(250)));
        assert!(matches!(config.cors_allowed_origins, CorsOrigins::List(ref o) if o.len() == 2));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config(&[("PORT", "  "), ("RENDER_TIMEOUT_MS", "0")]).unwrap();
        assert_eq!(config.port, 23119);
        assert!(config.render_timeout.is_none());
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        for (name, value) in [
            ("PORT", "eighty"),
            ("STRICT_ACCEPT", "maybe"),
            ("LOG_FORMAT", "xml"),
            ("MAX_CONCURRENT_REQUESTS", "0"),
            ("HOST", "not-an-ip"),
        ] {
            match config(&[(name, value)]) {
                Err(ConfigError::InvalidValue { name: got, .. }) => assert_eq!(got, name),
                other => panic!("{name}={value}: expected InvalidValue, got {other:?}"),
            }
        }
    }
}
