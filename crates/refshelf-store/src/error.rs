//! Error types for the storage layer.

use refshelf_core::{EntryId, LibraryId, Version};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Library not found.
    #[error("library not found: {0}")]
    LibraryNotFound(LibraryId),

    /// Entry not found.
    #[error("entry {entry} not found in library {library}")]
    EntryNotFound { library: LibraryId, entry: EntryId },

    /// Duplicate entry - an entry with this key already exists.
    #[error("duplicate entry: {entry} already exists in library {library}")]
    DuplicateEntry { library: LibraryId, entry: EntryId },

    /// Duplicate library - a library with this id is already registered.
    #[error("duplicate library: {0}")]
    DuplicateLibrary(LibraryId),

    /// Duplicate key inside a library being registered or reloaded.
    #[error("library {library} contains key {entry} more than once")]
    DuplicateKeyInSource { library: LibraryId, entry: EntryId },

    /// The caller's version token is stale.
    #[error("version conflict on {entry}: expected {expected}, current is {actual}")]
    VersionConflict {
        entry: EntryId,
        expected: Version,
        actual: Version,
    },

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}
