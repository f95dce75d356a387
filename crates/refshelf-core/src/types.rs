//! Core data types for refshelf.
//!
//! An [`Entry`] is one bibliographic record: a citation key, an entry type and
//! an ordered set of string fields. Entries live in a [`Library`], which keeps
//! insertion order so that listings are deterministic.
//!
//! Field names are case-insensitive in BibTeX; [`Fields`] normalizes them to
//! lowercase on insertion and keeps unknown names verbatim otherwise.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// ID Types
// ============================================================================

/// Characters that may not appear in a citation key.
const FORBIDDEN_KEY_CHARS: &[char] = &['{', '}', '(', ')', ',', '"', '#', '%', '\'', '=', '~', '\\'];

/// Citation key of an entry, unique within its library.
///
/// Keys are opaque strings, but they must survive being written as the key of
/// a BibTeX entry, so whitespace and BibTeX syntax characters are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Creates an EntryId after checking that it is a valid citation key.
    pub fn new(key: impl Into<String>) -> Result<Self, EntryIdParseError> {
        let key = key.into();
        if key.is_empty() {
            return Err(EntryIdParseError::Empty);
        }
        if let Some(c) = key
            .chars()
            .find(|c| c.is_whitespace() || FORBIDDEN_KEY_CHARS.contains(c))
        {
            return Err(EntryIdParseError::InvalidCharacter(c));
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryId {
    type Err = EntryIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Error type for parsing an EntryId.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryIdParseError {
    /// The key was empty.
    #[error("citation key must not be empty")]
    Empty,
    /// The key contained whitespace or a BibTeX syntax character.
    #[error("citation key contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identifier of a library served by this process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(String);

impl LibraryId {
    /// Creates a LibraryId from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Version
// ============================================================================

/// Optimistic-concurrency version of a stored entry.
///
/// Entries that have never been stored carry [`Version::UNSET`]. The store
/// bumps the counter on each successful update and never hands out a version
/// of a library twice, so a stale token stays stale across delete and reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Version of an entry that has not been stored.
    pub const UNSET: Self = Self(0);

    /// Version assigned to a newly inserted entry.
    pub const INITIAL: Self = Self(1);

    /// Returns the version that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Formats the version as a strong HTTP entity tag (`"3"`).
    #[must_use]
    pub fn to_etag(self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parses a version from an entity tag or a bare number.
    ///
    /// Accepts `"3"`, `W/"3"` and `3`.
    pub fn parse_token(token: &str) -> Result<Self, VersionParseError> {
        let token = token.trim();
        let token = token.strip_prefix("W/").unwrap_or(token);
        let token = token
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(token);
        token
            .parse::<u64>()
            .map(Self)
            .map_err(|_| VersionParseError(token.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for an unparseable version token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version token: {0:?}")]
pub struct VersionParseError(pub String);

// ============================================================================
// Entry Types
// ============================================================================

/// Type of a bibliographic entry.
///
/// Unknown types are preserved as [`EntryType::Other`] so that entries written
/// by newer tools survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    InBook,
    InCollection,
    InProceedings,
    Manual,
    MastersThesis,
    PhdThesis,
    Misc,
    Online,
    Proceedings,
    TechReport,
    Thesis,
    Unpublished,
    /// Any type not in the standard set, stored lowercase.
    Other(String),
}

impl EntryType {
    /// All standard entry types.
    pub const STANDARD: &'static [EntryType] = &[
        Self::Article,
        Self::Book,
        Self::Booklet,
        Self::InBook,
        Self::InCollection,
        Self::InProceedings,
        Self::Manual,
        Self::MastersThesis,
        Self::PhdThesis,
        Self::Misc,
        Self::Online,
        Self::Proceedings,
        Self::TechReport,
        Self::Thesis,
        Self::Unpublished,
    ];

    /// Lowercase name used in BibTeX and in JSON.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::Booklet => "booklet",
            Self::InBook => "inbook",
            Self::InCollection => "incollection",
            Self::InProceedings => "inproceedings",
            Self::Manual => "manual",
            Self::MastersThesis => "mastersthesis",
            Self::PhdThesis => "phdthesis",
            Self::Misc => "misc",
            Self::Online => "online",
            Self::Proceedings => "proceedings",
            Self::TechReport => "techreport",
            Self::Thesis => "thesis",
            Self::Unpublished => "unpublished",
            Self::Other(name) => name,
        }
    }

    /// Capitalized name used when writing `@Type{...}`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::InBook => "InBook".to_string(),
            Self::InCollection => "InCollection".to_string(),
            Self::InProceedings => "InProceedings".to_string(),
            Self::MastersThesis => "MastersThesis".to_string(),
            Self::PhdThesis => "PhdThesis".to_string(),
            Self::TechReport => "TechReport".to_string(),
            other => {
                let name = other.as_str();
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    /// Whether this is a thesis-like type whose publisher is a school.
    #[must_use]
    pub fn is_thesis(&self) -> bool {
        matches!(self, Self::MastersThesis | Self::PhdThesis | Self::Thesis)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = std::convert::Infallible;

    /// Parses a type name case-insensitively. Never fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let parsed = Self::STANDARD
            .iter()
            .find(|t| t.as_str() == lower)
            .cloned()
            .unwrap_or(Self::Other(lower));
        Ok(parsed)
    }
}

impl Serialize for EntryType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntryType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(parsed) = s.parse::<EntryType>();
        Ok(parsed)
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Insertion-ordered mapping of field name to value.
///
/// Names are lowercased on insertion. Equality ignores order: two field sets
/// are equal when they hold the same name/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    items: Vec<(String, String)>,
}

impl Fields {
    /// Creates an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a field, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.items
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of a field if it is set and not blank.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Whether a field is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a field, replacing an existing value in place.
    ///
    /// Returns the previous value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        let name = name.as_ref().to_lowercase();
        let value = value.into();
        match self.items.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.items.push((name, value));
                None
            }
        }
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        let index = self.items.iter().position(|(n, _)| *n == name)?;
        Some(self.items.remove(index).1)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no fields are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(n, v)| other.get(n) == Some(v))
    }
}

impl Eq for Fields {}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.set(name, value);
        }
        fields
    }
}

impl Serialize for Fields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (name, value) in &self.items {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to string values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Fields::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    fields.set(name, value);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

// ============================================================================
// Entry
// ============================================================================

/// A single bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Citation key, immutable once the entry is stored.
    pub id: EntryId,
    /// Entry type.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Field values in insertion order.
    pub fields: Fields,
    /// Version assigned by the store; [`Version::UNSET`] for unstored entries.
    #[serde(default = "unset_version")]
    pub version: Version,
}

fn unset_version() -> Version {
    Version::UNSET
}

impl Entry {
    /// Creates an unstored entry with no fields.
    #[must_use]
    pub fn new(id: EntryId, entry_type: EntryType) -> Self {
        Self {
            id,
            entry_type,
            fields: Fields::new(),
            version: Version::UNSET,
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.set(name, value);
        self
    }

    /// Shorthand for `self.fields.get(name)`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// Compares key, type and fields, ignoring the stored version.
    #[must_use]
    pub fn same_content(&self, other: &Entry) -> bool {
        self.id == other.id && self.entry_type == other.entry_type && self.fields == other.fields
    }
}

// ============================================================================
// Library
// ============================================================================

/// Descriptive data about a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryMetadata {
    /// Library identifier used in URLs.
    pub id: LibraryId,
    /// Human-readable name (the file stem for file-backed libraries).
    pub name: String,
    /// Character encoding declared by the source file.
    pub encoding: String,
    /// Storage format of the source, e.g. `bibtex`.
    pub format_version: String,
    /// File the library was loaded from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Number of entries at the time the metadata was read.
    pub entry_count: usize,
    /// Incremented each time the library is reloaded from its source.
    pub generation: u64,
    /// When the current generation was loaded.
    pub loaded_at: DateTime<Utc>,
}

impl LibraryMetadata {
    /// Creates metadata for an in-memory library with default encoding.
    #[must_use]
    pub fn new(id: LibraryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            encoding: "UTF-8".to_string(),
            format_version: "bibtex".to_string(),
            source: None,
            entry_count: 0,
            generation: 0,
            loaded_at: Utc::now(),
        }
    }
}

/// An ordered collection of entries plus metadata.
#[derive(Debug, Clone)]
pub struct Library {
    pub metadata: LibraryMetadata,
    pub entries: Vec<Entry>,
}

impl Library {
    /// Creates a library from metadata and entries.
    #[must_use]
    pub fn new(mut metadata: LibraryMetadata, entries: Vec<Entry>) -> Self {
        metadata.entry_count = entries.len();
        Self { metadata, entries }
    }
}
