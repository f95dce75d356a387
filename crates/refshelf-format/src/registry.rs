//! The format registry.
//!
//! Every representation the server can produce is registered here once at
//! startup, either as a bidirectional [`Codec`] or as a rendered citation
//! layout. After [`FormatRegistryBuilder::build`] the registry is immutable,
//! so lookups need no locking.
//!
//! ```
//! use refshelf_format::registry::FormatRegistry;
//!
//! let registry = FormatRegistry::with_defaults("bibtex").unwrap();
//! let native = registry.resolve("Application/X-BibTeX; charset=utf-8").unwrap();
//! assert_eq!(native.name, "bibtex");
//! assert_eq!(registry.resolve("native").unwrap().name, "bibtex");
//! assert!(registry.resolve("application/pdf").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::bibtex::BibtexCodec;
use crate::codec::Codec;
use crate::csl_json::CslJsonCodec;

/// Media type of the rendered citation envelope.
pub const CITATION_MEDIA_TYPE: &str = "application/vnd.refshelf.citation+json";

/// How a rendered citation is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderedLayout {
    /// JSON object with the text, per-entry items and failures.
    Envelope,
    /// The rendered text alone.
    PlainText,
}

/// What produces a representation.
#[derive(Debug, Clone)]
pub enum FormatTarget {
    Codec(Arc<dyn Codec>),
    Rendered(RenderedLayout),
}

/// A registered representation.
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    /// Canonical short name, e.g. `csl-json`.
    pub name: String,
    /// Primary media type sent as `Content-Type`.
    pub media_type: String,
    /// Extra names and media types accepted on lookup.
    pub aliases: Vec<String>,
    pub target: FormatTarget,
}

impl FormatDescriptor {
    /// Describes a codec-backed format under the codec's own name and media type.
    pub fn codec(codec: Arc<dyn Codec>, aliases: &[&str]) -> Self {
        Self {
            name: codec.name().to_string(),
            media_type: codec.media_type().to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            target: FormatTarget::Codec(codec),
        }
    }

    /// Describes a rendered citation format.
    pub fn rendered(name: &str, media_type: &str, layout: RenderedLayout, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            media_type: media_type.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            target: FormatTarget::Rendered(layout),
        }
    }

    /// The codec, for codec-backed formats.
    #[must_use]
    pub fn as_codec(&self) -> Option<&Arc<dyn Codec>> {
        match &self.target {
            FormatTarget::Codec(codec) => Some(codec),
            FormatTarget::Rendered(_) => None,
        }
    }

    /// The layout, for rendered formats. These need a citation style.
    #[must_use]
    pub fn rendered_layout(&self) -> Option<RenderedLayout> {
        match self.target {
            FormatTarget::Rendered(layout) => Some(layout),
            FormatTarget::Codec(_) => None,
        }
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.rendered_layout().is_some()
    }
}

/// Errors raised while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two formats claim the same media type.
    #[error("media type {0} is registered twice")]
    DuplicateMediaType(String),

    /// A name or alias is already taken by another format.
    #[error("format name {0} is registered twice")]
    DuplicateName(String),

    /// The configured default format is not registered.
    #[error("default format {0} is not registered")]
    UnknownDefault(String),

    /// The default must be a codec-backed format.
    #[error("default format {0} must be a codec-backed format")]
    RenderedDefault(String),
}

/// Normalizes a lookup token: lowercase, parameters and whitespace removed.
fn normalize(token: &str) -> String {
    token
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Immutable set of representations.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<Arc<FormatDescriptor>>,
    lookup: HashMap<String, usize>,
    default: usize,
}

impl FormatRegistry {
    pub fn builder() -> FormatRegistryBuilder {
        FormatRegistryBuilder::default()
    }

    /// Registry with the BibTeX and CSL-JSON codecs and both rendered formats.
    ///
    /// Registration order matters for wildcard media ranges (`text/*`).
    pub fn with_defaults(default_format: &str) -> Result<Self, RegistryError> {
        Self::builder()
            .register(FormatDescriptor::codec(
                Arc::new(BibtexCodec),
                &["native", "bib", "text/x-bibtex"],
            ))?
            .register(FormatDescriptor::codec(
                Arc::new(CslJsonCodec),
                &["json", "csl", "application/json"],
            ))?
            .register(FormatDescriptor::rendered(
                "citation",
                CITATION_MEDIA_TYPE,
                RenderedLayout::Envelope,
                &["rendered"],
            ))?
            .register(FormatDescriptor::rendered(
                "citation-text",
                "text/plain",
                RenderedLayout::PlainText,
                &["text", "txt"],
            ))?
            .default_format(default_format)
            .build()
    }

    /// Looks up a format by name, alias or media type.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<Arc<FormatDescriptor>> {
        self.lookup
            .get(&normalize(token))
            .map(|&i| Arc::clone(&self.formats[i]))
    }

    /// Matches one media range from an `Accept` header.
    ///
    /// `*/*` selects the default format; `type/*` the first registered format
    /// of that top-level type.
    #[must_use]
    pub fn resolve_media_range(&self, range: &str) -> Option<Arc<FormatDescriptor>> {
        let range = normalize(range);
        if range == "*/*" || range == "*" {
            return Some(self.default_format());
        }
        if let Some(top) = range.strip_suffix("/*") {
            let prefix = format!("{}/", top);
            return self
                .formats
                .iter()
                .find(|f| f.media_type.starts_with(&prefix))
                .map(Arc::clone);
        }
        self.resolve(&range)
    }

    /// The format used when nothing else was asked for.
    #[must_use]
    pub fn default_format(&self) -> Arc<FormatDescriptor> {
        Arc::clone(&self.formats[self.default])
    }

    /// All formats in registration order.
    pub fn formats(&self) -> impl Iterator<Item = &Arc<FormatDescriptor>> {
        self.formats.iter()
    }
}

/// Builder for [`FormatRegistry`].
#[derive(Debug, Default)]
pub struct FormatRegistryBuilder {
    formats: Vec<Arc<FormatDescriptor>>,
    lookup: HashMap<String, usize>,
    default: Option<String>,
}

impl FormatRegistryBuilder {
    /// Adds a format. Fails if its media type, name or any alias is taken.
    pub fn register(mut self, descriptor: FormatDescriptor) -> Result<Self, RegistryError> {
        let media_type = normalize(&descriptor.media_type);
        if self
            .formats
            .iter()
            .any(|f| normalize(&f.media_type) == media_type)
        {
            return Err(RegistryError::DuplicateMediaType(media_type));
        }

        let index = self.formats.len();
        let mut keys = vec![normalize(&descriptor.name), media_type];
        keys.extend(descriptor.aliases.iter().map(|a| normalize(a)));
        for key in keys {
            if let Some(&existing) = self.lookup.get(&key) {
                if existing != index {
                    return Err(RegistryError::DuplicateName(key));
                }
            }
            self.lookup.insert(key, index);
        }

        tracing::debug!(
            format = %descriptor.name,
            media_type = %descriptor.media_type,
            "Registered format"
        );
        self.formats.push(Arc::new(descriptor));
        Ok(self)
    }

    /// Sets the fallback format by name or alias.
    #[must_use]
    pub fn default_format(mut self, name: &str) -> Self {
        self.default = Some(name.to_string());
        self
    }

    /// Finishes registration. Without an explicit default the first format is used.
    pub fn build(self) -> Result<FormatRegistry, RegistryError> {
        let default = match &self.default {
            Some(name) => {
                let index = *self
                    .lookup
                    .get(&normalize(name))
                    .ok_or_else(|| RegistryError::UnknownDefault(name.clone()))?;
                if self.formats[index].is_rendered() {
                    return Err(RegistryError::RenderedDefault(name.clone()));
                }
                index
            }
            None if self.formats.is_empty() => {
                return Err(RegistryError::UnknownDefault(String::new()));
            }
            None => 0,
        };
        Ok(FormatRegistry {
            formats: self.formats,
            lookup: self.lookup,
            default,
        })
    }
}
