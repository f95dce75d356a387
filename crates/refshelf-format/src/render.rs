//! The citation rendering engine.
//!
//! Rendering is a pure function of (entries, style, mode): bibliography sorts
//! are stable and tie-break on the citation key, and per-type layouts live in
//! a `BTreeMap`, so the same input always produces the same bytes.
//!
//! Problems with individual entries never fail the whole batch. A missing
//! required field is replaced by the part's fallback (or left out) and an
//! entry that renders to nothing is dropped; both are reported as
//! [`RenderFailure`]s next to the output.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use refshelf_core::{Entry, Name, parse_name_list};

use crate::style::{
    BibliographyLayout, CitationStyle, DelimiterPrecedesLast, InlineKind, InlineLayout,
    NameOptions, NameOrder, Part, PartForm, SortOrder, StyleCatalog, StyleHandle,
};

// ============================================================================
// Types
// ============================================================================

/// What to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Full reference list entries.
    #[default]
    Bibliography,
    /// In-text citation.
    Inline,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bibliography => "bibliography",
            Self::Inline => "inline",
        })
    }
}

/// Error for an unrecognized render mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown render mode {0:?}: expected bibliography or inline")]
pub struct UnknownRenderMode(pub String);

impl FromStr for RenderMode {
    type Err = UnknownRenderMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bibliography" | "bib" => Ok(Self::Bibliography),
            "inline" | "citation" => Ok(Self::Inline),
            _ => Err(UnknownRenderMode(s.to_string())),
        }
    }
}

/// A problem with one entry that did not stop the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFailure {
    pub entry_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Rendered text of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    pub id: String,
    pub text: String,
}

/// Result of a render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    /// Id of the style used.
    pub style: String,
    pub mode: RenderMode,
    /// The complete rendered text.
    pub text: String,
    /// Per-entry text in output order; excluded entries are absent.
    pub items: Vec<RenderedItem>,
    pub failures: Vec<RenderFailure>,
}

/// Request-level rendering errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The style name is not known to the catalog.
    #[error("unknown citation style: {0}")]
    StyleNotFound(String),

    #[error("style {0} defines no bibliography layout")]
    NoBibliographyLayout(String),

    #[error("rendering was cancelled")]
    Cancelled,
}

/// Cooperative cancellation signal, checked between entries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Renders entries with styles resolved from a catalog.
#[derive(Debug, Clone)]
pub struct CitationEngine {
    catalog: Arc<dyn StyleCatalog>,
}

impl CitationEngine {
    pub fn new(catalog: Arc<dyn StyleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn StyleCatalog> {
        &self.catalog
    }

    /// Resolves a style by name.
    pub fn resolve(&self, name: &str) -> Result<StyleHandle, RenderError> {
        self.catalog
            .resolve_style(name)
            .ok_or_else(|| RenderError::StyleNotFound(name.to_string()))
    }

    /// Resolves `style` and renders.
    pub fn render_named(
        &self,
        entries: &[Entry],
        style: &str,
        mode: RenderMode,
        cancel: &CancelFlag,
    ) -> Result<RenderOutput, RenderError> {
        let style = self.resolve(style)?;
        self.render(entries, &style, mode, cancel)
    }

    /// Renders entries in the given order (bibliography sorting aside).
    pub fn render(
        &self,
        entries: &[Entry],
        style: &CitationStyle,
        mode: RenderMode,
        cancel: &CancelFlag,
    ) -> Result<RenderOutput, RenderError> {
        let output = match mode {
            RenderMode::Bibliography => {
                let layout = style
                    .bibliography
                    .as_ref()
                    .ok_or_else(|| RenderError::NoBibliographyLayout(style.id.clone()))?;
                render_bibliography(entries, style, layout, cancel)?
            }
            RenderMode::Inline => render_inline(entries, style, cancel)?,
        };

        if !output.failures.is_empty() {
            tracing::warn!(
                style = %style.id,
                mode = %mode,
                failures = output.failures.len(),
                "Rendered with partial failures"
            );
        }
        Ok(output)
    }
}

fn failure(entry: &Entry, field: Option<&str>, message: impl Into<String>) -> RenderFailure {
    RenderFailure {
        entry_id: entry.id.to_string(),
        field: field.map(str::to_string),
        message: message.into(),
    }
}

fn names_of(entry: &Entry) -> Vec<Name> {
    ["author", "editor"]
        .iter()
        .find_map(|f| entry.fields.get_non_empty(f))
        .map(parse_name_list)
        .unwrap_or_default()
}

fn year_of(entry: &Entry) -> Option<String> {
    ["year", "date"]
        .iter()
        .find_map(|f| entry.fields.get_non_empty(f))
        .map(extract_year)
}

// ============================================================================
// Bibliography
// ============================================================================

fn sort_key(entry: &Entry) -> (String, String, String) {
    let title = plain_text(entry.field("title").unwrap_or("")).to_lowercase();
    let first = names_of(entry)
        .first()
        .map(|n| plain_text(n.family.as_deref().or(n.literal.as_deref()).unwrap_or("")))
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| title.clone());
    (first, year_of(entry).unwrap_or_default(), title)
}

fn render_bibliography(
    entries: &[Entry],
    style: &CitationStyle,
    layout: &BibliographyLayout,
    cancel: &CancelFlag,
) -> Result<RenderOutput, RenderError> {
    let mut order: Vec<&Entry> = entries.iter().collect();
    if layout.sort == SortOrder::AuthorYearTitle {
        let mut keyed: Vec<_> = order.into_iter().map(|e| (sort_key(e), e)).collect();
        keyed.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then_with(|| a.id.cmp(&b.id)));
        order = keyed.into_iter().map(|(_, e)| e).collect();
    }

    let mut items = Vec::with_capacity(order.len());
    let mut failures = Vec::new();
    for entry in order {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let text = render_entry(entry, style, layout.parts_for(entry.entry_type.as_str()), &mut failures);
        match text {
            Some(text) => {
                let label = match &layout.numbering {
                    Some(n) => format!("{}{}{}", n.prefix, items.len() + 1, n.suffix),
                    None => String::new(),
                };
                items.push(RenderedItem {
                    id: entry.id.to_string(),
                    text: format!("{}{}", label, text),
                });
            }
            None => failures.push(failure(entry, None, "entry rendered to empty text and was excluded")),
        }
    }

    let text = items
        .iter()
        .map(|i| i.text.as_str())
        .collect::<Vec<_>>()
        .join(&layout.entry_delimiter);
    Ok(RenderOutput {
        style: style.id.clone(),
        mode: RenderMode::Bibliography,
        text,
        items,
        failures,
    })
}

fn render_entry(
    entry: &Entry,
    style: &CitationStyle,
    parts: &[Part],
    failures: &mut Vec<RenderFailure>,
) -> Option<String> {
    let mut out = String::new();
    for part in parts {
        if let Some(text) = &part.text {
            append(&mut out, &part.prefix);
            append(&mut out, text);
            append(&mut out, &part.suffix);
            continue;
        }
        match format_part(entry, part, &style.names) {
            Some(value) => {
                append(&mut out, &part.prefix);
                out.push_str(&value);
                append(&mut out, &part.suffix);
            }
            None => {
                if part.required {
                    let message = if part.fallback.is_some() {
                        "missing required field; fallback used"
                    } else {
                        "missing required field; omitted"
                    };
                    failures.push(failure(entry, Some(&part.field), message));
                }
                if let Some(fallback) = &part.fallback {
                    append(&mut out, fallback);
                }
            }
        }
    }

    let text = out.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Appends layout text, dropping a leading period that would double up with
/// sentence-ending punctuation already written.
fn append(out: &mut String, piece: &str) {
    let piece = match piece.strip_prefix('.') {
        Some(rest) if out.trim_end().ends_with(['.', '?', '!']) => rest,
        _ => piece,
    };
    out.push_str(piece);
}

fn format_part(entry: &Entry, part: &Part, names: &NameOptions) -> Option<String> {
    let raw = part.fields().find_map(|f| entry.fields.get_non_empty(f))?;
    let value = match part.form {
        PartForm::Text => plain_text(raw),
        PartForm::Names => format_names(&parse_name_list(raw), names),
        PartForm::Year => extract_year(raw),
        PartForm::Pages => plain_text(raw).replace("--", "\u{2013}").replace('-', "\u{2013}"),
        PartForm::Quoted => format!("\u{201c}{}\u{201d}", plain_text(raw)),
        PartForm::TitleCase => title_case(&plain_text(raw)),
    };
    (!value.trim().is_empty()).then_some(value)
}

// ============================================================================
// Inline
// ============================================================================

fn render_inline(
    entries: &[Entry],
    style: &CitationStyle,
    cancel: &CancelFlag,
) -> Result<RenderOutput, RenderError> {
    let layout = &style.inline;
    let mut items = Vec::with_capacity(entries.len());
    let mut bodies = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let body = inline_body(entry, layout, index + 1, &mut failures);
        items.push(RenderedItem {
            id: entry.id.to_string(),
            text: format!("{}{}{}", layout.prefix, body, layout.suffix),
        });
        bodies.push(body);
    }

    let text = if bodies.is_empty() {
        String::new()
    } else {
        format!("{}{}{}", layout.prefix, bodies.join(&layout.delimiter), layout.suffix)
    };
    Ok(RenderOutput {
        style: style.id.clone(),
        mode: RenderMode::Inline,
        text,
        items,
        failures,
    })
}

fn inline_body(
    entry: &Entry,
    layout: &InlineLayout,
    number: usize,
    failures: &mut Vec<RenderFailure>,
) -> String {
    match layout.kind {
        InlineKind::Numeric => number.to_string(),
        InlineKind::Key => entry.id.to_string(),
        InlineKind::AuthorYear => {
            let names = names_of(entry);
            let who = if names.is_empty() {
                failures.push(failure(entry, Some("author|editor"), "no author or editor; title used"));
                entry
                    .fields
                    .get_non_empty("title")
                    .map(plain_text)
                    .unwrap_or_else(|| entry.id.to_string())
            } else {
                inline_names(&names, layout)
            };
            let year = year_of(entry).unwrap_or_else(|| {
                failures.push(failure(entry, Some("year|date"), "no year; n.d. used"));
                "n.d.".to_string()
            });
            format!("{}{}{}", who, layout.year_separator, year)
        }
    }
}

fn inline_names(names: &[Name], layout: &InlineLayout) -> String {
    let families: Vec<String> = names.iter().map(|n| plain_text(&n.full_family())).collect();
    match families.len() {
        0 => String::new(),
        1 => families[0].clone(),
        n if n >= layout.et_al_min.max(2) => format!("{}{}", families[0], layout.et_al_text),
        2 => format!("{} {} {}", families[0], layout.and, families[1]),
        n => format!(
            "{}, {} {}",
            families[..n - 1].join(", "),
            layout.and,
            families[n - 1]
        ),
    }
}

// ============================================================================
// Text helpers
// ============================================================================

/// Writes a name list with the given options.
pub fn format_names(names: &[Name], options: &NameOptions) -> String {
    if names.is_empty() {
        return String::new();
    }
    let truncated = options.et_al_min.is_some_and(|min| names.len() >= min);
    let shown = if truncated {
        &names[..options.et_al_use_first.clamp(1, names.len())]
    } else {
        names
    };

    let written: Vec<String> = shown
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let inverted = match options.name_as_sort_order {
                NameOrder::All => true,
                NameOrder::First => i == 0,
                NameOrder::None => false,
            };
            format_name(name, options, inverted)
        })
        .collect();

    if truncated {
        return format!("{}{}", written.join(&options.delimiter), options.et_al_text);
    }
    let last = written.len() - 1;
    if last == 0 || options.and.is_empty() {
        return written.join(&options.delimiter);
    }
    let separator = match (options.delimiter_precedes_last, written.len()) {
        (DelimiterPrecedesLast::Always, _) => options.delimiter.as_str(),
        (DelimiterPrecedesLast::Contextual, n) if n > 2 => options.delimiter.as_str(),
        _ => " ",
    };
    format!(
        "{}{}{} {}",
        written[..last].join(&options.delimiter),
        separator,
        options.and,
        written[last]
    )
}

fn format_name(name: &Name, options: &NameOptions, inverted: bool) -> String {
    if let Some(literal) = &name.literal {
        return plain_text(literal);
    }
    let family = plain_text(&name.full_family());
    let given = name.given.as_deref().map(|g| {
        if options.initials {
            initials(g, &options.initialize_with)
        } else {
            plain_text(g)
        }
    });

    let mut out = match (given, inverted) {
        (Some(given), true) => format!("{}, {}", family, given),
        (Some(given), false) => format!("{} {}", given, family),
        (None, _) => family,
    };
    if let Some(suffix) = &name.suffix {
        out.push_str(", ");
        out.push_str(suffix);
    }
    out
}

/// `Jean-Paul Marie` → `J.-P. M.`
fn initials(given: &str, with: &str) -> String {
    plain_text(given)
        .split_whitespace()
        .map(|word| {
            word.split('-')
                .filter_map(|part| part.graphemes(true).next())
                .map(|g| format!("{}{}", g, with))
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The first four-digit run, or the whole value when there is none.
fn extract_year(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .windows(4)
        .enumerate()
        .find(|(i, w)| {
            w.iter().all(char::is_ascii_digit)
                && !chars.get(i + 4).is_some_and(char::is_ascii_digit)
                && (*i == 0 || !chars[i - 1].is_ascii_digit())
        })
        .map(|(_, w)| w.iter().collect())
        .unwrap_or_else(|| plain_text(value))
}

/// Strips BibTeX markup: protective braces, escapes and ties.
fn plain_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => out.push(' '),
            '\\' => {
                if let Some(&next) = chars.peek() {
                    if "&%$#_{}".contains(next) {
                        out.push(next);
                        chars.next();
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "in", "nor", "of", "on", "or", "the", "to",
    "via", "with",
];

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
