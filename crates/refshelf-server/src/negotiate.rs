//! Content negotiation.
//!
//! Picks the representation of a response from three sources:
//! 1. the explicit `format` query parameter
//! 2. the `Accept` header, in the client's preference order (`q` values,
//!    ties keep header order)
//! 3. the configured default format
//!
//! With `PREFER_ACCEPT_HEADER` the first two swap places. An explicit
//! format that is not registered is always rejected, never replaced by a
//! fallback. Negotiation reads configuration only; it never touches library
//! state, so handlers run it before any mutation.

use std::sync::Arc;

use refshelf_core::EntryId;
use refshelf_format::{FormatDescriptor, FormatRegistry, RenderMode, RenderedLayout, StyleHandle};

use crate::error::ApiError;

/// Which formats an endpoint can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Codecs and rendered citations.
    Any,
    /// Rendered citations only; the default is the `citation` envelope.
    Rendered,
    /// Codecs only, used for request bodies.
    Codec,
}

impl Scope {
    fn allows(self, format: &FormatDescriptor) -> bool {
        match self {
            Self::Any => true,
            Self::Rendered => format.is_rendered(),
            Self::Codec => !format.is_rendered(),
        }
    }
}

/// Format chosen for a response, with the style name when it is rendered.
#[derive(Debug, Clone)]
pub struct Selection {
    pub format: Arc<FormatDescriptor>,
    /// Requested or default style; `None` for codec formats.
    pub style: Option<String>,
    pub mode: RenderMode,
}

/// A negotiated response: the format plus, for rendered formats, the
/// resolved style.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub format: Arc<FormatDescriptor>,
    pub style: Option<StyleHandle>,
    pub mode: RenderMode,
}

impl Negotiated {
    /// Binds the negotiated representation to the entries it applies to.
    #[must_use]
    pub fn for_entries(self, ids: Vec<EntryId>) -> RenderRequest {
        RenderRequest {
            ids,
            format: self.format,
            style: self.style,
            mode: self.mode,
        }
    }
}

/// Everything needed to produce one response body: which entries, in which
/// order, in which representation. Built per request and dropped with it.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub ids: Vec<EntryId>,
    pub format: Arc<FormatDescriptor>,
    pub style: Option<StyleHandle>,
    pub mode: RenderMode,
}

impl RenderRequest {
    /// The layout when this request renders citations.
    #[must_use]
    pub fn rendered(&self) -> Option<(RenderedLayout, &StyleHandle)> {
        Some((self.format.rendered_layout()?, self.style.as_ref()?))
    }
}

/// Parses an `Accept` header into media ranges in preference order.
///
/// Ranges with `q=0` are dropped; unparseable `q` values count as 1.
///
/// ```
/// use refshelf_server::negotiate::parse_accept;
///
/// let ranges = parse_accept("text/plain;q=0.5, application/json, */*;q=0");
/// assert_eq!(ranges, vec!["application/json", "text/plain"]);
/// ```
pub fn parse_accept(header: &str) -> Vec<String> {
    let mut ranges: Vec<(u16, String)> = header
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let range = parts.next()?.trim().to_ascii_lowercase();
            if range.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .map(|q| (q.clamp(0.0, 1.0) * 1000.0).round() as u16)
                .unwrap_or(1000);
            (quality > 0).then_some((quality, range))
        })
        .collect();
    // Stable sort keeps header order among equal weights.
    ranges.sort_by(|a, b| b.0.cmp(&a.0));
    ranges.into_iter().map(|(_, range)| range).collect()
}

/// Applies the negotiation policy against the format registry.
#[derive(Debug, Clone)]
pub struct Negotiator {
    registry: Arc<FormatRegistry>,
    prefer_accept_header: bool,
    strict_accept: bool,
    default_style: String,
}

impl Negotiator {
    pub fn new(
        registry: Arc<FormatRegistry>,
        prefer_accept_header: bool,
        strict_accept: bool,
        default_style: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            prefer_accept_header,
            strict_accept,
            default_style: default_style.into(),
        }
    }

    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    pub fn default_style(&self) -> &str {
        &self.default_style
    }

    fn scope_default(&self, scope: Scope) -> Option<Arc<FormatDescriptor>> {
        let default = self.registry.default_format();
        if scope.allows(&default) {
            return Some(default);
        }
        self.registry.formats().find(|f| scope.allows(f)).cloned()
    }

    /// Resolves an explicit format token; unknown or out-of-scope tokens fail.
    fn explicit(&self, token: &str, scope: Scope) -> Result<Arc<FormatDescriptor>, ApiError> {
        self.registry
            .resolve(token)
            .filter(|f| scope.allows(f))
            .ok_or_else(|| ApiError::UnsupportedFormat(format!("unsupported format: {}", token)))
    }

    fn match_range(&self, range: &str, scope: Scope) -> Option<Arc<FormatDescriptor>> {
        if range == "*/*" || range == "*" {
            return self.scope_default(scope);
        }
        if let Some(top) = range.strip_suffix("/*") {
            let prefix = format!("{}/", top);
            return self
                .registry
                .formats()
                .find(|f| f.media_type.starts_with(&prefix) && scope.allows(f))
                .cloned();
        }
        self.registry.resolve(range).filter(|f| scope.allows(f))
    }

    /// First acceptable format from the header.
    ///
    /// `Ok(None)` when there is no usable preference; an error when the
    /// header names only unsupported types and strict matching is on.
    fn from_accept(
        &self,
        accept: Option<&str>,
        scope: Scope,
    ) -> Result<Option<Arc<FormatDescriptor>>, ApiError> {
        let Some(header) = accept.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let ranges = parse_accept(header);
        if let Some(found) = ranges.iter().find_map(|r| self.match_range(r, scope)) {
            return Ok(Some(found));
        }
        if self.strict_accept {
            return Err(ApiError::UnsupportedFormat(format!(
                "none of the accepted media types can be produced: {}",
                header
            )));
        }
        tracing::debug!(accept = %header, "No acceptable media type, using default");
        Ok(None)
    }

    /// Chooses the response format.
    pub fn select_format(
        &self,
        format: Option<&str>,
        accept: Option<&str>,
        scope: Scope,
    ) -> Result<Arc<FormatDescriptor>, ApiError> {
        let format = format.map(str::trim).filter(|f| !f.is_empty());

        let chosen = if self.prefer_accept_header {
            match (self.from_accept(accept, scope), format) {
                (Ok(Some(found)), _) => Some(found),
                (_, Some(token)) => Some(self.explicit(token, scope)?),
                (Err(e), None) => return Err(e),
                (Ok(None), None) => None,
            }
        } else {
            match format {
                Some(token) => Some(self.explicit(token, scope)?),
                None => self.from_accept(accept, scope)?,
            }
        };

        match chosen.or_else(|| self.scope_default(scope)) {
            Some(found) => {
                tracing::debug!(format = %found.name, "Negotiated format");
                Ok(found)
            }
            None => Err(ApiError::UnsupportedFormat(
                "no format is registered for this resource".to_string(),
            )),
        }
    }

    /// Chooses the format, style name and render mode of a response.
    pub fn select(
        &self,
        format: Option<&str>,
        accept: Option<&str>,
        style: Option<&str>,
        mode: Option<&str>,
        scope: Scope,
    ) -> Result<Selection, ApiError> {
        let format = self.select_format(format, accept, scope)?;
        let mode = match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m
                .parse::<RenderMode>()
                .map_err(|e| ApiError::malformed(e.to_string()))?,
            None => RenderMode::default(),
        };
        let style = format.is_rendered().then(|| {
            style
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(&self.default_style)
                .to_string()
        });
        Ok(Selection {
            format,
            style,
            mode,
        })
    }

    /// Chooses the codec used to decode a request body.
    ///
    /// `Content-Type` decides; without one the `format` parameter does, and
    /// without either the default format is assumed.
    pub fn body_format(
        &self,
        content_type: Option<&str>,
        format: Option<&str>,
    ) -> Result<Arc<FormatDescriptor>, ApiError> {
        let declared = content_type
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| format.map(str::trim).filter(|f| !f.is_empty()));
        match declared {
            Some(token) => self
                .registry
                .resolve(token)
                .filter(|f| Scope::Codec.allows(f))
                .ok_or_else(|| {
                    ApiError::UnsupportedFormat(format!("cannot decode a body of type {}", token))
                }),
            None => Ok(self.registry.default_format()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator(prefer_accept: bool, strict: bool) -> Negotiator {
        Negotiator::new(
            Arc::new(FormatRegistry::with_defaults("bibtex").unwrap()),
            prefer_accept,
            strict,
            "apa",
        )
    }

    fn name(result: Result<Arc<FormatDescriptor>, ApiError>) -> String {
        result.unwrap().name.clone()
    }

    #[test]
    fn test_parse_accept_orders_by_quality() {
        assert_eq!(
            parse_accept("text/plain;q=0.2, application/x-bibtex;q=0.9, application/json"),
            vec!["application/json", "application/x-bibtex", "text/plain"]
        );
        assert_eq!(parse_accept("a/b, c/d"), vec!["a/b", "c/d"]);
        assert!(parse_accept("text/plain;q=0").is_empty());
        assert_eq!(parse_accept("TEXT/Plain; charset=utf-8"), vec!["text/plain"]);
    }

    #[test]
    fn test_explicit_parameter_wins_over_accept() {
        let n = negotiator(false, true);
        assert_eq!(
            name(n.select_format(Some("csl-json"), Some("application/x-bibtex"), Scope::Any)),
            "csl-json"
        );
    }

    #[test]
    fn test_accept_wins_when_preferred() {
        let n = negotiator(true, true);
        assert_eq!(
            name(n.select_format(Some("csl-json"), Some("application/x-bibtex"), Scope::Any)),
            "bibtex"
        );
        assert_eq!(
            name(n.select_format(Some("csl-json"), Some("image/png"), Scope::Any)),
            "csl-json"
        );
    }

    #[test]
    fn test_first_acceptable_in_preference_order() {
        let n = negotiator(false, true);
        assert_eq!(
            name(n.select_format(None, Some("image/png, text/plain;q=0.4, application/json"), Scope::Any)),
            "csl-json"
        );
    }

    #[test]
    fn test_default_when_nothing_requested() {
        let n = negotiator(false, true);
        assert_eq!(name(n.select_format(None, None, Scope::Any)), "bibtex");
        assert_eq!(name(n.select_format(None, Some("*/*"), Scope::Any)), "bibtex");
        assert_eq!(name(n.select_format(None, None, Scope::Rendered)), "citation");
        assert_eq!(name(n.select_format(None, Some("*/*"), Scope::Rendered)), "citation");
    }

    #[test]
    fn test_unknown_explicit_format_is_rejected() {
        let n = negotiator(false, false);
        let err = n.select_format(Some("pdf"), None, Scope::Any).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedRepresentation");
        assert_eq!(err.status_code(), http::StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_strict_accept() {
        let strict = negotiator(false, true);
        assert!(strict.select_format(None, Some("image/png"), Scope::Any).is_err());

        let lenient = negotiator(false, false);
        assert_eq!(
            name(lenient.select_format(None, Some("image/png"), Scope::Any)),
            "bibtex"
        );
    }

    #[test]
    fn test_rendered_scope_rejects_codecs() {
        let n = negotiator(false, true);
        assert!(n.select_format(Some("bibtex"), None, Scope::Rendered).is_err());
        assert_eq!(
            name(n.select_format(None, Some("text/*"), Scope::Rendered)),
            "citation-text"
        );
    }

    #[test]
    fn test_style_defaults_only_for_rendered_formats() {
        let n = negotiator(false, true);
        let rendered = n
            .select(Some("citation"), None, None, Some("inline"), Scope::Any)
            .unwrap();
        assert_eq!(rendered.style.as_deref(), Some("apa"));
        assert_eq!(rendered.mode, RenderMode::Inline);

        let named = n
            .select(Some("citation"), None, Some("ieee"), None, Scope::Any)
            .unwrap();
        assert_eq!(named.style.as_deref(), Some("ieee"));
        assert_eq!(named.mode, RenderMode::Bibliography);

        let encoded = n
            .select(Some("bibtex"), None, Some("ieee"), None, Scope::Any)
            .unwrap();
        assert!(encoded.style.is_none());
    }

    #[test]
    fn test_unknown_mode_is_malformed() {
        let n = negotiator(false, true);
        let err = n
            .select(Some("citation"), None, None, Some("footnote"), Scope::Any)
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");
    }

    #[test]
    fn test_body_format() {
        let n = negotiator(false, true);
        assert_eq!(
            name(n.body_format(Some("application/json; charset=utf-8"), Some("bibtex"))),
            "csl-json"
        );
        assert_eq!(name(n.body_format(None, Some("csl"))), "csl-json");
        assert_eq!(name(n.body_format(None, None)), "bibtex");
        assert!(n.body_format(Some("text/plain"), None).is_err());
    }
}
