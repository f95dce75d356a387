//! Citation style definitions and catalogs.
//!
//! A style is a JSON document describing how names are written, how inline
//! citations look and, optionally, how bibliography entries are laid out per
//! entry type. Styles are looked up by name through a [`StyleCatalog`]; the
//! rendering engine never cares where a style came from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, StyleCache};

/// Shared, immutable handle to a resolved style.
pub type StyleHandle = Arc<CitationStyle>;

// ============================================================================
// Definition
// ============================================================================

/// A complete citation style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CitationStyle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub names: NameOptions,
    pub inline: InlineLayout,
    /// Styles without a bibliography layout only support inline citations.
    #[serde(default)]
    pub bibliography: Option<BibliographyLayout>,
}

/// Which names of a list are written family name first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameOrder {
    /// `Doe, J., Smith, A.`
    All,
    /// `Doe, Jane, and Alan Smith`
    First,
    /// `J. Doe and A. Smith`
    #[default]
    None,
}

/// Whether the delimiter is written before the final `and`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelimiterPrecedesLast {
    /// Only for lists of three or more.
    #[default]
    Contextual,
    Always,
    Never,
}

/// How name lists are written in the bibliography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NameOptions {
    /// Abbreviate given names to initials.
    pub initials: bool,
    /// Appended to each initial.
    pub initialize_with: String,
    pub name_as_sort_order: NameOrder,
    pub delimiter: String,
    /// Word joining the last two names (`and`, `&`).
    pub and: String,
    pub delimiter_precedes_last: DelimiterPrecedesLast,
    /// Lists with at least this many names are truncated.
    pub et_al_min: Option<usize>,
    pub et_al_use_first: usize,
    pub et_al_text: String,
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            initials: false,
            initialize_with: ".".to_string(),
            name_as_sort_order: NameOrder::None,
            delimiter: ", ".to_string(),
            and: "and".to_string(),
            delimiter_precedes_last: DelimiterPrecedesLast::Contextual,
            et_al_min: None,
            et_al_use_first: 1,
            et_al_text: " et al.".to_string(),
        }
    }
}

/// Kind of in-text citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InlineKind {
    /// `(Doe & Smith, 2020)`
    #[default]
    AuthorYear,
    /// `[1]`, numbered by position in the cited set.
    Numeric,
    /// `[doe2020]`
    Key,
}

/// Layout of in-text citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct InlineLayout {
    pub kind: InlineKind,
    pub prefix: String,
    pub suffix: String,
    /// Between citations of a multi-entry cite.
    pub delimiter: String,
    /// Word joining two family names.
    pub and: String,
    /// Three or more authors are written `Doe et al.`.
    pub et_al_min: usize,
    pub et_al_text: String,
    /// Between the names and the year.
    pub year_separator: String,
}

impl Default for InlineLayout {
    fn default() -> Self {
        Self {
            kind: InlineKind::AuthorYear,
            prefix: "(".to_string(),
            suffix: ")".to_string(),
            delimiter: "; ".to_string(),
            and: "&".to_string(),
            et_al_min: 3,
            et_al_text: " et al.".to_string(),
            year_separator: ", ".to_string(),
        }
    }
}

/// Bibliography ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// First author's family name, then year, then title.
    #[default]
    AuthorYearTitle,
    /// The order the entries were requested in.
    CitationOrder,
}

/// Number label written before each bibliography entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Numbering {
    pub prefix: String,
    pub suffix: String,
}

/// Layout of the bibliography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BibliographyLayout {
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub numbering: Option<Numbering>,
    /// Written between entries.
    #[serde(default = "newline")]
    pub entry_delimiter: String,
    /// Parts for entry types without their own layout.
    pub default: Vec<Part>,
    /// Per entry type (lowercase BibTeX type name).
    #[serde(default)]
    pub types: BTreeMap<String, Vec<Part>>,
}

fn newline() -> String {
    "\n".to_string()
}

impl BibliographyLayout {
    /// Parts used for an entry type.
    #[must_use]
    pub fn parts_for(&self, entry_type: &str) -> &[Part] {
        self.types
            .get(entry_type)
            .map(Vec::as_slice)
            .unwrap_or(&self.default)
    }
}

/// How a part's value is formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartForm {
    #[default]
    Text,
    /// A BibTeX name list written with the style's name options.
    Names,
    /// The four-digit year out of `year` or an ISO `date`.
    Year,
    /// Page range with an en dash.
    Pages,
    /// Wrapped in typographic quotes.
    Quoted,
    TitleCase,
}

/// One piece of a bibliography entry: a field value or fixed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Part {
    /// Field name, or alternatives separated by `|` (first present wins).
    #[serde(default)]
    pub field: String,
    /// Fixed text written instead of a field value.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub form: PartForm,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Missing required parts are reported as render failures.
    #[serde(default)]
    pub required: bool,
    /// Written in place of a missing part (prefix and suffix excluded).
    #[serde(default)]
    pub fallback: Option<String>,
}

impl Part {
    /// The alternative field names of this part.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.field.split('|').map(str::trim).filter(|f| !f.is_empty())
    }
}

/// Errors raised while loading style definitions.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("invalid style name {0:?}: use lowercase letters, digits, '.', '_' or '-'")]
    InvalidName(String),

    #[error("failed to read style {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid style definition {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Normalizes a style name to its lookup form.
///
/// ```
/// use refshelf_format::style::normalize_style_name;
///
/// assert_eq!(normalize_style_name(" APA ").unwrap(), "apa");
/// assert!(normalize_style_name("../etc/passwd").is_err());
/// ```
pub fn normalize_style_name(name: &str) -> Result<String, StyleError> {
    let normalized = name.trim().to_ascii_lowercase();
    let valid = !normalized.is_empty()
        && !normalized.starts_with('.')
        && normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(normalized)
    } else {
        Err(StyleError::InvalidName(name.to_string()))
    }
}

/// Parse a style definition from JSON.
pub fn parse_style(name: &str, json: &str) -> Result<CitationStyle, StyleError> {
    serde_json::from_str(json).map_err(|source| StyleError::Parse {
        name: name.to_string(),
        source,
    })
}

// ============================================================================
// Catalogs
// ============================================================================

/// Resolves citation styles by name.
pub trait StyleCatalog: Send + Sync + fmt::Debug {
    /// Looks up a style. Names are matched after [`normalize_style_name`].
    fn resolve_style(&self, name: &str) -> Option<StyleHandle>;

    /// Names of every style this catalog can resolve, sorted.
    fn available(&self) -> Vec<String>;

    /// Drops cached lookups.
    fn invalidate(&self) {}
}

const BUILTIN_STYLES: &[(&str, &str)] = &[
    ("apa", include_str!("../styles/apa.json")),
    ("chicago-author-date", include_str!("../styles/chicago-author-date.json")),
    ("ieee", include_str!("../styles/ieee.json")),
];

/// Styles compiled into the binary.
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    styles: BTreeMap<String, StyleHandle>,
}

impl BuiltinCatalog {
    /// Parses the bundled style definitions.
    pub fn load() -> Result<Self, StyleError> {
        let styles = BUILTIN_STYLES
            .iter()
            .map(|(name, json)| Ok((name.to_string(), Arc::new(parse_style(name, json)?))))
            .collect::<Result<BTreeMap<_, _>, StyleError>>()?;
        Ok(Self { styles })
    }
}

impl StyleCatalog for BuiltinCatalog {
    fn resolve_style(&self, name: &str) -> Option<StyleHandle> {
        let name = normalize_style_name(name).ok()?;
        self.styles.get(&name).cloned()
    }

    fn available(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }
}

/// Styles read from `<dir>/<name>.json`, with lookups cached.
///
/// Both hits and misses are cached until they expire or the catalog is
/// invalidated, so a style added to the directory shows up after a reload.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
    cache: StyleCache,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>, config: CacheConfig) -> Self {
        Self {
            dir: dir.into(),
            cache: StyleCache::with_config(config),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn cache(&self) -> &StyleCache {
        &self.cache
    }

    fn load(&self, name: &str) -> Result<Option<CitationStyle>, StyleError> {
        let path = self.dir.join(format!("{}.json", name));
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StyleError::Io { path, source }),
        };
        parse_style(name, &json).map(Some)
    }
}

impl StyleCatalog for DirectoryCatalog {
    fn resolve_style(&self, name: &str) -> Option<StyleHandle> {
        let name = normalize_style_name(name).ok()?;
        if let Some(cached) = self.cache.get(&name) {
            return cached.style;
        }

        let style = match self.load(&name) {
            Ok(style) => style.map(Arc::new),
            Err(e) => {
                tracing::warn!(style = %name, error = %e, "Failed to load style");
                None
            }
        };
        self.cache.set(name, style.clone());
        style
    }

    fn available(&self) -> Vec<String> {
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = dir
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter_map(|stem| normalize_style_name(&stem).ok().filter(|n| *n == stem))
            .collect();
        names.sort();
        names
    }

    fn invalidate(&self) {
        self.cache.clear();
    }
}

/// Tries each catalog in turn; earlier layers shadow later ones.
#[derive(Debug, Clone, Default)]
pub struct LayeredCatalog {
    layers: Vec<Arc<dyn StyleCatalog>>,
}

impl LayeredCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Arc<dyn StyleCatalog>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl StyleCatalog for LayeredCatalog {
    fn resolve_style(&self, name: &str) -> Option<StyleHandle> {
        self.layers.iter().find_map(|layer| layer.resolve_style(name))
    }

    fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.iter().flat_map(|l| l.available()).collect();
        names.sort();
        names.dedup();
        names
    }

    fn invalidate(&self) {
        for layer in &self.layers {
            layer.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "id": "mini",
        "title": "Minimal",
        "inline": {"kind": "key", "prefix": "[", "suffix": "]"}
    }"#;

    fn directory(dir: &TempDir) -> DirectoryCatalog {
        DirectoryCatalog::new(dir.path(), CacheConfig::new(Duration::from_secs(300)))
    }

    #[test]
    fn test_builtin_styles_parse() {
        let catalog = BuiltinCatalog::load().unwrap();
        assert_eq!(catalog.available(), vec!["apa", "chicago-author-date", "ieee"]);
        for name in catalog.available() {
            let style = catalog.resolve_style(&name).unwrap();
            assert_eq!(style.id, name);
            assert!(style.bibliography.is_some());
        }
        assert!(catalog.resolve_style("APA").is_some());
        assert!(catalog.resolve_style("unknown-style").is_none());
    }

    #[test]
    fn test_minimal_style_defaults() {
        let style = parse_style("mini", MINIMAL).unwrap();
        assert_eq!(style.inline.kind, InlineKind::Key);
        assert_eq!(style.inline.delimiter, "; ");
        assert_eq!(style.names, NameOptions::default());
        assert!(style.bibliography.is_none());
    }

    #[test]
    fn test_part_alternatives() {
        let part: Part = serde_json::from_str(r#"{"field": "author | editor"}"#).unwrap();
        assert_eq!(part.fields().collect::<Vec<_>>(), vec!["author", "editor"]);
        assert_eq!(part.form, PartForm::Text);
    }

    #[test]
    fn test_style_names_are_restricted() {
        assert!(normalize_style_name("chicago-author-date").is_ok());
        assert!(normalize_style_name("my_style.v2").is_ok());
        assert!(normalize_style_name("").is_err());
        assert!(normalize_style_name("a/b").is_err());
        assert!(normalize_style_name(".hidden").is_err());
    }

    #[test]
    fn test_directory_catalog_reads_and_caches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mini.json"), MINIMAL).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let catalog = directory(&dir);

        assert_eq!(catalog.available(), vec!["mini"]);
        assert_eq!(catalog.resolve_style("Mini").unwrap().id, "mini");
        assert_eq!(catalog.cache().len(), 1);

        // Cached: removing the file does not affect the lookup until invalidated.
        std::fs::remove_file(dir.path().join("mini.json")).unwrap();
        assert!(catalog.resolve_style("mini").is_some());
        catalog.invalidate();
        assert!(catalog.resolve_style("mini").is_none());
    }

    #[test]
    fn test_directory_catalog_caches_misses_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let catalog = directory(&dir);
        assert!(catalog.resolve_style("mini").is_none());

        std::fs::write(dir.path().join("mini.json"), MINIMAL).unwrap();
        assert!(catalog.resolve_style("mini").is_none());
        catalog.invalidate();
        assert!(catalog.resolve_style("mini").is_some());
    }

    #[test]
    fn test_broken_style_file_is_unresolved() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(directory(&dir).resolve_style("broken").is_none());
    }

    #[test]
    fn test_layered_catalog_prefers_first_layer() {
        let dir = TempDir::new().unwrap();
        let shadow = MINIMAL.replace("\"mini\"", "\"apa\"");
        std::fs::write(dir.path().join("apa.json"), shadow).unwrap();

        let layered = LayeredCatalog::new()
            .with_layer(Arc::new(directory(&dir)))
            .with_layer(Arc::new(BuiltinCatalog::load().unwrap()));

        let apa = layered.resolve_style("apa").unwrap();
        assert_eq!(apa.title, "Minimal");
        assert!(layered.resolve_style("ieee").is_some());
        assert_eq!(
            layered.available(),
            vec!["apa", "chicago-author-date", "ieee"]
        );
    }
}
