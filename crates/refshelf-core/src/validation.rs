//! Entry validation.
//!
//! Runs before any write reaches the store:
//! - required fields per entry type (`author/editor` means either satisfies it)
//! - brace balance of every field value, since an unbalanced value cannot be
//!   written back as BibTeX
//! - integrity rules (a `proceedings` volume has no page range)
//!
//! All problems are collected; validation never stops at the first one.

use serde::Serialize;
use std::fmt;

use crate::types::{Entry, EntryType};

/// A problem with one field of an otherwise well-formed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldProblem {
    pub field: String,
    pub reason: String,
}

/// Validation failure with every problem found.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationError {
    /// Missing requirements, e.g. `title` or `author/editor`.
    pub missing: Vec<String>,
    /// Fields whose value is present but unacceptable.
    pub invalid: Vec<FieldProblem>,
}

impl ValidationError {
    fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required field(s): {}", self.missing.join(", ")));
        }
        for problem in &self.invalid {
            parts.push(format!("{}: {}", problem.field, problem.reason));
        }
        parts.join("; ")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry failed validation: {}", self.summary())
    }
}

impl std::error::Error for ValidationError {}

/// Required field groups for an entry type. Each inner slice lists
/// alternatives; one of them must be present.
#[must_use]
pub fn required_fields(entry_type: &EntryType) -> &'static [&'static [&'static str]] {
    const YEAR: &[&str] = &["year", "date"];
    match entry_type {
        EntryType::Article => &[&["author"], &["title"], &["journal"], YEAR],
        EntryType::Book => &[&["author", "editor"], &["title"], &["publisher"], YEAR],
        EntryType::Booklet => &[&["title"]],
        EntryType::InBook => &[
            &["author", "editor"],
            &["title"],
            &["chapter", "pages"],
            &["publisher"],
            YEAR,
        ],
        EntryType::InCollection => &[
            &["author"],
            &["title"],
            &["booktitle"],
            &["publisher"],
            YEAR,
        ],
        EntryType::InProceedings => &[&["author"], &["title"], &["booktitle"], YEAR],
        EntryType::Manual => &[&["title"]],
        EntryType::MastersThesis | EntryType::PhdThesis => {
            &[&["author"], &["title"], &["school"], YEAR]
        }
        EntryType::Thesis => &[&["author"], &["title"], &["school", "institution"], YEAR],
        EntryType::Online => &[&["title"], &["url"]],
        EntryType::Proceedings => &[&["title"], YEAR],
        EntryType::TechReport => &[&["author"], &["title"], &["institution"], YEAR],
        EntryType::Unpublished => &[&["author"], &["title"], &["note"]],
        EntryType::Misc | EntryType::Other(_) => &[],
    }
}

/// Check that every `{` has a matching `}`. Escaped braces do not count.
///
/// A lone trailing backslash is rejected too: written inside braces it would
/// escape the closing delimiter.
pub fn check_braces(value: &str) -> Result<(), String> {
    let mut depth = 0i64;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(format!("{} unclosed opening brace(s)", depth));
    }
    if escaped {
        return Err("value ends with an unpaired backslash".to_string());
    }
    Ok(())
}

/// Validate an entry, returning every problem found.
pub fn validate_entry(entry: &Entry) -> Result<(), ValidationError> {
    let mut error = ValidationError::default();

    for group in required_fields(&entry.entry_type) {
        if !group.iter().any(|name| entry.fields.get_non_empty(name).is_some()) {
            error.missing.push(group.join("/"));
        }
    }

    for (name, value) in entry.fields.iter() {
        if let Err(reason) = check_braces(value) {
            error.invalid.push(FieldProblem {
                field: name.to_string(),
                reason,
            });
        }
    }

    if entry.entry_type == EntryType::Proceedings && entry.fields.get_non_empty("pages").is_some() {
        error.invalid.push(FieldProblem {
            field: "pages".to_string(),
            reason: "wrong entry type as proceedings has page numbers".to_string(),
        });
    }

    if error.is_empty() { Ok(()) } else { Err(error) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryId;

    fn entry(entry_type: EntryType) -> Entry {
        Entry::new(EntryId::new("e1").unwrap(), entry_type)
    }

    #[test]
    fn test_complete_article_passes() {
        let e = entry(EntryType::Article)
            .with_field("author", "Doe, Jane")
            .with_field("title", "A")
            .with_field("journal", "J")
            .with_field("year", "2020");
        assert!(validate_entry(&e).is_ok());
    }

    #[test]
    fn test_missing_fields_are_all_listed() {
        let e = entry(EntryType::Article).with_field("title", "A");
        let err = validate_entry(&e).unwrap_err();
        assert_eq!(err.missing, vec!["author", "journal", "year/date"]);
        assert!(err.to_string().contains("author"));
    }

    #[test]
    fn test_alternatives_satisfy_requirement() {
        let e = entry(EntryType::Book)
            .with_field("editor", "Doe, Jane")
            .with_field("title", "B")
            .with_field("publisher", "P")
            .with_field("date", "2001-02");
        assert!(validate_entry(&e).is_ok());
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let e = entry(EntryType::Booklet).with_field("title", "   ");
        assert_eq!(validate_entry(&e).unwrap_err().missing, vec!["title"]);
    }

    #[test]
    fn test_unknown_types_have_no_requirements() {
        assert!(validate_entry(&entry(EntryType::Other("dataset".into()))).is_ok());
        assert!(validate_entry(&entry(EntryType::Misc)).is_ok());
    }

    #[test]
    fn test_unbalanced_braces_rejected() {
        let e = entry(EntryType::Misc).with_field("title", "{");
        let err = validate_entry(&e).unwrap_err();
        assert_eq!(err.invalid[0].field, "title");
    }

    #[test]
    fn test_trailing_backslash_rejected() {
        let e = entry(EntryType::Misc).with_field("note", "C:\\dir\\");
        let err = validate_entry(&e).unwrap_err();
        assert_eq!(err.invalid[0].field, "note");
    }

    #[test]
    fn test_check_braces() {
        assert!(check_braces("Incorporating {\\O}evolutionary {Measures}").is_ok());
        assert!(check_braces("{\\}").is_err());
        assert!(check_braces("}{").is_err());
        assert!(check_braces("\\{ escaped").is_ok());
        assert!(check_braces("C:\\dir\\").is_err());
        assert!(check_braces("ends in a pair \\\\").is_ok());
    }

    #[test]
    fn test_proceedings_with_pages_flagged() {
        let e = entry(EntryType::Proceedings)
            .with_field("title", "Proc")
            .with_field("year", "2020")
            .with_field("pages", "1--10");
        let err = validate_entry(&e).unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.invalid[0].field, "pages");
    }
}
