//! The library accessor interface consumed by the HTTP core.
//!
//! Every operation is synchronous and safe to call from many request
//! handlers at once. A committed mutation is visible to every later read in
//! the same process. Writes carry the version the caller last read; a stale
//! version is reported as [`StoreError::VersionConflict`] and the write is
//! not applied.
//!
//! [`StoreError::VersionConflict`]: crate::StoreError::VersionConflict

use refshelf_core::{Entry, EntryId, EntryType, Library, LibraryId, LibraryMetadata, Version};
use serde::Deserialize;

use crate::error::StoreResult;

/// Filter applied when listing entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFilter {
    /// Only entries of this type.
    #[serde(default, rename = "type")]
    pub entry_type: Option<EntryType>,
    /// Case-insensitive substring matched against the key and all field values.
    #[serde(default, rename = "q")]
    pub text: Option<String>,
    /// Number of matching entries to skip.
    #[serde(default)]
    pub offset: Option<usize>,
    /// Maximum number of entries to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EntryFilter {
    /// Whether an entry passes the type and text conditions.
    ///
    /// Paging is applied by the accessor, not here.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        if self
            .entry_type
            .as_ref()
            .is_some_and(|t| entry.entry_type != *t)
        {
            return false;
        }
        match self.text.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                entry.id.as_str().to_lowercase().contains(&needle)
                    || entry
                        .fields
                        .iter()
                        .any(|(_, value)| value.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    /// Applies the filter and paging to entries in library order.
    pub fn apply<'a>(&self, entries: impl Iterator<Item = &'a Entry>) -> Vec<Entry> {
        entries
            .filter(|e| self.matches(e))
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Read/write handle to the bibliographic libraries of this process.
pub trait LibraryAccessor: Send + Sync {
    /// Metadata of every library, in registration order.
    fn libraries(&self) -> StoreResult<Vec<LibraryMetadata>>;

    /// Metadata of one library.
    fn library(&self, library: &LibraryId) -> StoreResult<LibraryMetadata>;

    /// Look up one entry.
    fn get(&self, library: &LibraryId, id: &EntryId) -> StoreResult<Entry>;

    /// Entries matching the filter, in insertion order.
    fn list(&self, library: &LibraryId, filter: &EntryFilter) -> StoreResult<Vec<Entry>>;

    /// Store a new entry. Fails with `DuplicateEntry` when the key is taken.
    ///
    /// The stored entry is returned with [`Version::INITIAL`].
    fn insert(&self, library: &LibraryId, entry: Entry) -> StoreResult<Entry>;

    /// Replace an existing entry if its current version is `expected`.
    ///
    /// The stored entry is returned with the next version.
    fn put(&self, library: &LibraryId, entry: Entry, expected: Version) -> StoreResult<Entry>;

    /// Remove an entry if its current version is `expected`.
    fn delete(&self, library: &LibraryId, id: &EntryId, expected: Version) -> StoreResult<()>;

    /// Replace the whole content of a library, e.g. after re-reading its
    /// source file. Returns the updated metadata with a bumped generation.
    fn replace(&self, library: &LibraryId, content: Library) -> StoreResult<LibraryMetadata>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, entry_type: EntryType, title: &str) -> Entry {
        Entry::new(EntryId::new(key).unwrap(), entry_type).with_field("title", title)
    }

    #[test]
    fn test_filter_by_type() {
        let filter = EntryFilter {
            entry_type: Some(EntryType::Book),
            ..Default::default()
        };
        assert!(filter.matches(&entry("b", EntryType::Book, "x")));
        assert!(!filter.matches(&entry("a", EntryType::Article, "x")));
    }

    #[test]
    fn test_filter_text_is_case_insensitive_and_checks_key() {
        let filter = EntryFilter {
            text: Some("QUANTUM".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&entry("a", EntryType::Misc, "On quantum things")));
        assert!(filter.matches(&entry("quantum2020", EntryType::Misc, "Other")));
        assert!(!filter.matches(&entry("b", EntryType::Misc, "Classical")));
    }

    #[test]
    fn test_blank_text_matches_everything() {
        let filter = EntryFilter {
            text: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&entry("a", EntryType::Misc, "x")));
    }

    #[test]
    fn test_apply_pages_after_filtering() {
        let entries = vec![
            entry("a", EntryType::Book, "1"),
            entry("b", EntryType::Article, "2"),
            entry("c", EntryType::Book, "3"),
            entry("d", EntryType::Book, "4"),
        ];
        let filter = EntryFilter {
            entry_type: Some(EntryType::Book),
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let result = filter.apply(entries.iter());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id.as_str(), "c");
    }
}
