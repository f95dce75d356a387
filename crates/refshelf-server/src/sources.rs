//! Libraries backed by `.bib` files.
//!
//! Files are read once at startup and again on an explicit reload. Entries
//! come in as the file has them; validation only applies to API writes.

use std::path::{Path, PathBuf};

use refshelf_core::{Library, LibraryId, LibraryMetadata, derive_library_id};
use refshelf_format::{CodecError, parse_library};
use refshelf_store::{LibraryAccessor, MemoryStore, StoreError};

use crate::error::ApiError;

/// Errors raised while loading a library file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read library {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse library {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Parse { source, .. } => source.into(),
            SourceError::Store(source) => source.into(),
            io @ SourceError::Io { .. } => ApiError::Internal(io.to_string()),
        }
    }
}

/// Reads and parses a library file.
///
/// The id is derived from the canonical path, so it is stable across
/// restarts and across the different spellings of one path.
pub fn read_library(path: &Path) -> Result<Library, SourceError> {
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let bytes = std::fs::read(&path).map_err(|source| SourceError::Io {
        path: path.clone(),
        source,
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Library is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    let parsed = parse_library(&text).map_err(|source| SourceError::Parse {
        path: path.clone(),
        source,
    })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string());
    let mut metadata = LibraryMetadata::new(derive_library_id(&path), name);
    if let Some(encoding) = parsed.encoding {
        metadata.encoding = encoding;
    }
    metadata.source = Some(path);
    Ok(Library::new(metadata, parsed.entries))
}

/// Loads every file into the store, stopping at the first failure.
pub fn load_libraries(store: &MemoryStore, paths: &[PathBuf]) -> Result<Vec<LibraryMetadata>, SourceError> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        let library = read_library(path)?;
        loaded.push(store.register(library)?);
    }
    Ok(loaded)
}

/// Re-reads a library from its source file and swaps its content.
pub fn reload_library(store: &dyn LibraryAccessor, id: &LibraryId) -> Result<LibraryMetadata, ApiError> {
    let metadata = store.library(id)?;
    let source = metadata.source.ok_or_else(|| {
        ApiError::malformed(format!("library {} has no source file to reload from", id))
    })?;
    let content = read_library(&source)?;
    Ok(store.replace(id, content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use refshelf_core::EntryId;

    fn bib_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".bib").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_library() {
        let file = bib_file(
            "% Encoding: ISO-8859-1\n@article{e1,\n  title = {A},\n}\n@book{b1, title = {B}}\n",
        );
        let library = read_library(file.path()).unwrap();

        assert_eq!(library.entries.len(), 2);
        assert_eq!(library.metadata.encoding, "ISO-8859-1");
        assert_eq!(library.metadata.entry_count, 2);
        assert!(library.metadata.source.is_some());
        assert_eq!(library.metadata.id, read_library(file.path()).unwrap().metadata.id);
    }

    #[test]
    fn test_parse_errors_name_the_file() {
        let file = bib_file("@article{e1, title = {open\n");
        let err = read_library(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert!(err.to_string().contains(".bib"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_library(Path::new("/nonexistent/refs.bib")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_reload_swaps_content_and_bumps_generation() {
        let file = bib_file("@misc{a, title = {First}}\n");
        let store = MemoryStore::new();
        let loaded = load_libraries(&store, &[file.path().to_path_buf()]).unwrap();
        let id = loaded[0].id.clone();

        std::fs::write(file.path(), "@misc{a, title = {Second}}\n@misc{b, title = {New}}\n").unwrap();

        let metadata = reload_library(&store, &id).unwrap();
        assert_eq!(metadata.generation, loaded[0].generation + 1);
        assert_eq!(metadata.entry_count, 2);
        let a = store.get(&id, &EntryId::new("a").unwrap()).unwrap();
        assert_eq!(a.field("title"), Some("Second"));
    }

    #[test]
    fn test_reload_without_source_is_rejected() {
        let store = MemoryStore::new();
        let id = LibraryId::new("memory");
        store
            .register(Library::new(LibraryMetadata::new(id.clone(), "memory"), vec![]))
            .unwrap();
        let err = reload_library(&store, &id).unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");

        let missing = reload_library(&store, &LibraryId::new("other")).unwrap_err();
        assert_eq!(missing.kind(), "NotFound");
    }
}
