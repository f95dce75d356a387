//! In-process library store.
//!
//! Libraries are kept in registration order behind an outer `RwLock`, keyed by
//! id; each library has its own `RwLock` so writers to one library never block
//! readers of another. Version checks and bumps happen under the library's
//! write lock, which linearizes all mutations of a single entry.
//!
//! Every library remembers the highest version it has issued. Inserted and
//! reloaded entries start above that mark, so a token never names two states.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use refshelf_core::{Entry, EntryId, Library, LibraryId, LibraryMetadata, Version};

use crate::accessor::{EntryFilter, LibraryAccessor};
use crate::error::{StoreError, StoreResult};

/// Entries of one library plus a key index.
#[derive(Debug)]
struct LibrarySlot {
    metadata: LibraryMetadata,
    entries: Vec<Entry>,
    index: HashMap<EntryId, usize>,
    /// Highest version issued in this library.
    last_version: Version,
}

impl LibrarySlot {
    /// Build a slot whose entries all start one above `floor`.
    fn from_library(library: Library, floor: Version) -> StoreResult<Self> {
        let Library { metadata, entries } = library;
        let start = floor.next();
        let mut slot = Self {
            metadata,
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
            last_version: start,
        };
        for mut entry in entries {
            if slot.index.contains_key(&entry.id) {
                return Err(StoreError::DuplicateKeyInSource {
                    library: slot.metadata.id.clone(),
                    entry: entry.id,
                });
            }
            entry.version = start;
            slot.index.insert(entry.id.clone(), slot.entries.len());
            slot.entries.push(entry);
        }
        if slot.entries.is_empty() {
            slot.last_version = floor;
        }
        slot.metadata.entry_count = slot.entries.len();
        Ok(slot)
    }

    fn position(&self, id: &EntryId) -> StoreResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::EntryNotFound {
                library: self.metadata.id.clone(),
                entry: id.clone(),
            })
    }

    fn check_version(&self, position: usize, expected: Version) -> StoreResult<()> {
        let current = &self.entries[position];
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                entry: current.id.clone(),
                expected,
                actual: current.version,
            });
        }
        Ok(())
    }

    fn issue(&mut self, version: Version) -> Version {
        self.last_version = self.last_version.max(version);
        version
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
    }
}

/// Library store held entirely in memory.
///
/// This is cloneable; clones share the same libraries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    libraries: Arc<RwLock<Vec<(LibraryId, Arc<RwLock<LibrarySlot>>)>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library loaded by the storage engine.
    ///
    /// Every entry is stored at [`Version::INITIAL`]. Keys must be unique.
    /// Later inserts continue above the highest version issued so far.
    pub fn register(&self, library: Library) -> StoreResult<LibraryMetadata> {
        let slot = LibrarySlot::from_library(library, Version::UNSET)?;
        let metadata = slot.metadata.clone();

        let mut libraries = self.libraries.write().map_err(|_| StoreError::LockPoisoned)?;
        if libraries.iter().any(|(id, _)| *id == metadata.id) {
            return Err(StoreError::DuplicateLibrary(metadata.id));
        }
        libraries.push((metadata.id.clone(), Arc::new(RwLock::new(slot))));

        tracing::info!(
            library = %metadata.id,
            entries = metadata.entry_count,
            "Library registered"
        );
        Ok(metadata)
    }

    fn slot(&self, id: &LibraryId) -> StoreResult<Arc<RwLock<LibrarySlot>>> {
        let libraries = self.libraries.read().map_err(|_| StoreError::LockPoisoned)?;
        libraries
            .iter()
            .find(|(library, _)| library == id)
            .map(|(_, slot)| Arc::clone(slot))
            .ok_or_else(|| StoreError::LibraryNotFound(id.clone()))
    }
}

fn read(slot: &RwLock<LibrarySlot>) -> StoreResult<RwLockReadGuard<'_, LibrarySlot>> {
    slot.read().map_err(|_| StoreError::LockPoisoned)
}

fn write(slot: &RwLock<LibrarySlot>) -> StoreResult<RwLockWriteGuard<'_, LibrarySlot>> {
    slot.write().map_err(|_| StoreError::LockPoisoned)
}

impl LibraryAccessor for MemoryStore {
    fn libraries(&self) -> StoreResult<Vec<LibraryMetadata>> {
        let libraries = self.libraries.read().map_err(|_| StoreError::LockPoisoned)?;
        libraries
            .iter()
            .map(|(_, slot)| read(slot).map(|s| s.metadata.clone()))
            .collect()
    }

    fn library(&self, library: &LibraryId) -> StoreResult<LibraryMetadata> {
        let slot = self.slot(library)?;
        let guard = read(&slot)?;
        Ok(guard.metadata.clone())
    }

    fn get(&self, library: &LibraryId, id: &EntryId) -> StoreResult<Entry> {
        let slot = self.slot(library)?;
        let guard = read(&slot)?;
        let position = guard.position(id)?;
        Ok(guard.entries[position].clone())
    }

    fn list(&self, library: &LibraryId, filter: &EntryFilter) -> StoreResult<Vec<Entry>> {
        let slot = self.slot(library)?;
        let guard = read(&slot)?;
        Ok(filter.apply(guard.entries.iter()))
    }

    fn insert(&self, library: &LibraryId, mut entry: Entry) -> StoreResult<Entry> {
        let slot = self.slot(library)?;
        let mut guard = write(&slot)?;
        if guard.index.contains_key(&entry.id) {
            return Err(StoreError::DuplicateEntry {
                library: library.clone(),
                entry: entry.id,
            });
        }

        let next = guard.last_version.next();
        entry.version = guard.issue(next);
        let position = guard.entries.len();
        guard.index.insert(entry.id.clone(), position);
        guard.entries.push(entry.clone());
        guard.metadata.entry_count = guard.entries.len();

        tracing::info!(library = %library, entry = %entry.id, "Entry inserted");
        Ok(entry)
    }

    fn put(&self, library: &LibraryId, mut entry: Entry, expected: Version) -> StoreResult<Entry> {
        let slot = self.slot(library)?;
        let mut guard = write(&slot)?;
        let position = guard.position(&entry.id)?;
        guard.check_version(position, expected)?;

        entry.version = guard.issue(expected.next());
        guard.entries[position] = entry.clone();

        tracing::info!(
            library = %library,
            entry = %entry.id,
            version = %entry.version,
            "Entry updated"
        );
        Ok(entry)
    }

    fn delete(&self, library: &LibraryId, id: &EntryId, expected: Version) -> StoreResult<()> {
        let slot = self.slot(library)?;
        let mut guard = write(&slot)?;
        let position = guard.position(id)?;
        guard.check_version(position, expected)?;

        guard.entries.remove(position);
        guard.rebuild_index();
        guard.metadata.entry_count = guard.entries.len();

        tracing::info!(library = %library, entry = %id, "Entry deleted");
        Ok(())
    }

    fn replace(&self, library: &LibraryId, content: Library) -> StoreResult<LibraryMetadata> {
        let slot = self.slot(library)?;
        let mut guard = write(&slot)?;
        let mut replacement = LibrarySlot::from_library(content, guard.last_version)?;
        replacement.metadata.id = guard.metadata.id.clone();
        replacement.metadata.generation = guard.metadata.generation + 1;
        replacement.metadata.loaded_at = Utc::now();
        *guard = replacement;

        tracing::info!(
            library = %library,
            generation = guard.metadata.generation,
            entries = guard.metadata.entry_count,
            "Library replaced"
        );
        Ok(guard.metadata.clone())
    }
}
