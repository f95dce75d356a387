//! refshelf-store: library accessor for refshelf
//!
//! This crate provides:
//! - [`LibraryAccessor`]: the interface the HTTP core uses to read and mutate
//!   libraries (lookup by id, filtered listing, versioned put and delete)
//! - [`MemoryStore`]: an in-process implementation holding libraries loaded
//!   by the storage engine
//! - [`StoreError`]: not-found, duplicate and version-conflict outcomes
//!
//! # Usage
//!
//! ```rust
//! use refshelf_core::{Entry, EntryId, EntryType, Library, LibraryId, LibraryMetadata, Version};
//! use refshelf_store::{LibraryAccessor, MemoryStore, StoreError};
//!
//! let store = MemoryStore::new();
//! let lib = LibraryId::new("refs");
//! store.register(Library::new(LibraryMetadata::new(lib.clone(), "refs"), vec![])).unwrap();
//!
//! let entry = Entry::new(EntryId::new("e1").unwrap(), EntryType::Misc);
//! let stored = store.insert(&lib, entry).unwrap();
//! assert_eq!(stored.version, Version::INITIAL);
//!
//! // A write against a stale version is rejected, never merged.
//! let stale = store.put(&lib, stored.clone(), Version(7));
//! assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));
//! ```

pub mod accessor;
pub mod error;
pub mod memory;

pub use accessor::{EntryFilter, LibraryAccessor};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

// Re-export refshelf-core for downstream crates
pub use refshelf_core;
