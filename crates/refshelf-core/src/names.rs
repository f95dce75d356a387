//! BibTeX name lists.
//!
//! `author` and `editor` hold several names joined by ` and `. Each name is in
//! one of the forms `First von Last`, `von Last, First` or
//! `von Last, Jr, First`; a name wrapped in braces (`{World Health
//! Organization}`) is a literal and is never split.

use serde::{Deserialize, Serialize};

/// One parsed personal or institutional name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Name {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    /// Lowercase prefix of the family name (`van`, `de la`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Name that must not be split (organizations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl Name {
    /// Creates a personal name from family and given parts.
    #[must_use]
    pub fn personal(family: &str, given: &str) -> Self {
        Self {
            family: Some(family.to_string()),
            given: (!given.is_empty()).then(|| given.to_string()),
            ..Self::default()
        }
    }

    /// Creates a literal name.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self {
            literal: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Family name including its particle, or the literal.
    #[must_use]
    pub fn full_family(&self) -> String {
        if let Some(literal) = &self.literal {
            return literal.clone();
        }
        match (&self.particle, &self.family) {
            (Some(p), Some(f)) => format!("{} {}", p, f),
            (None, Some(f)) => f.clone(),
            (Some(p), None) => p.clone(),
            (None, None) => String::new(),
        }
    }

    /// Writes the name in canonical BibTeX form (`von Last, Jr, First`).
    #[must_use]
    pub fn to_bibtex(&self) -> String {
        if let Some(literal) = &self.literal {
            return format!("{{{}}}", literal);
        }
        let mut out = self.full_family();
        if let Some(suffix) = &self.suffix {
            out.push_str(", ");
            out.push_str(suffix);
            out.push_str(", ");
            out.push_str(self.given.as_deref().unwrap_or(""));
        } else if let Some(given) = &self.given {
            out.push_str(", ");
            out.push_str(given);
        }
        out
    }
}

/// Join names back into a BibTeX name list.
pub fn format_name_list(names: &[Name]) -> String {
    names
        .iter()
        .map(Name::to_bibtex)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Parse a BibTeX name list.
///
/// Empty input yields an empty list. Splitting only happens on ` and ` at
/// brace depth zero, so `{Barnes and Noble}` stays one literal name.
pub fn parse_name_list(value: &str) -> Vec<Name> {
    split_top_level_and(value)
        .into_iter()
        .map(|part| parse_single_name(part.trim()))
        .filter(|name| *name != Name::default())
        .collect()
}

fn split_top_level_and(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = value.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b' ' | b'\t' | b'\n' if depth == 0 => {
                let rest = &bytes[i + 1..];
                if rest.len() >= 4
                    && rest[..3].eq_ignore_ascii_case(b"and")
                    && rest[3].is_ascii_whitespace()
                {
                    parts.push(&value[start..i]);
                    i += 4;
                    start = i + 1;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&value[start..]);
    parts
}

fn parse_single_name(raw: &str) -> Name {
    if raw.is_empty() {
        return Name::default();
    }
    if let Some(inner) = strip_outer_braces(raw) {
        return Name::literal(inner);
    }

    let segments = split_top_level(raw, ',');
    match segments.as_slice() {
        [last, first] => with_particle(last.trim(), None, first.trim()),
        [last, jr, first, ..] => with_particle(last.trim(), Some(jr.trim()), first.trim()),
        _ => {
            // First von Last: the family name starts at the first lowercase
            // word, or is the final word when there is none.
            let words = split_top_level(raw, ' ')
                .into_iter()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>();
            if words.len() == 1 {
                return Name::personal(words[0], "");
            }
            let von_start = words[..words.len() - 1]
                .iter()
                .position(|w| starts_lowercase(w));
            let (given, rest) = match von_start {
                Some(pos) if pos > 0 => (words[..pos].join(" "), &words[pos..]),
                _ => (
                    words[..words.len() - 1].join(" "),
                    &words[words.len() - 1..],
                ),
            };
            with_particle(&rest.join(" "), None, &given)
        }
    }
}

fn with_particle(last: &str, suffix: Option<&str>, given: &str) -> Name {
    let words: Vec<&str> = last.split_whitespace().collect();
    let particle_len = words
        .iter()
        .take(words.len().saturating_sub(1))
        .take_while(|w| starts_lowercase(w))
        .count();
    let particle = (particle_len > 0).then(|| words[..particle_len].join(" "));
    let family = words[particle_len..].join(" ");
    Name {
        family: (!family.is_empty()).then_some(family),
        given: (!given.is_empty()).then(|| given.to_string()),
        particle,
        suffix: suffix.filter(|s| !s.is_empty()).map(str::to_string),
        literal: None,
    }
}

fn starts_lowercase(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_lowercase)
}

fn strip_outer_braces(raw: &str) -> Option<&str> {
    let inner = raw.strip_prefix('{')?.strip_suffix('}')?;
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

fn split_top_level(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in value.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}
