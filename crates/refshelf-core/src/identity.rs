//! Library identifier derivation.
//!
//! A file-backed library is identified by its file stem plus a short hash of
//! the full path, so two `references.bib` files in different directories get
//! distinct ids while the id stays stable across restarts:
//!
//! ```
//! use refshelf_core::identity::derive_library_id;
//! use std::path::Path;
//!
//! let id = derive_library_id(Path::new("/home/me/papers/references.bib"));
//! assert!(id.as_str().starts_with("references-"));
//! assert_eq!(id, derive_library_id(Path::new("/home/me/papers/references.bib")));
//! ```

use std::path::Path;

use crate::types::LibraryId;

/// Number of hex characters of the path hash kept in the id.
const HASH_PREFIX_LEN: usize = 8;

/// Derive a LibraryId from the path of the library file.
///
/// Uses the blake3 hash of the path bytes; the stem is lowercased and any
/// character outside `[a-z0-9_-]` is replaced by `_` so the id is URL-safe.
pub fn derive_library_id(path: &Path) -> LibraryId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "library".to_string());
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let hash = blake3::hash(path.to_string_lossy().as_bytes());
    let hex = hash.to_hex();
    LibraryId::new(format!("{}-{}", stem, &hex.as_str()[..HASH_PREFIX_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_same_id() {
        let a = derive_library_id(Path::new("/tmp/a/refs.bib"));
        let b = derive_library_id(Path::new("/tmp/a/refs.bib"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_stem_different_dirs_differ() {
        let a = derive_library_id(Path::new("/tmp/a/refs.bib"));
        let b = derive_library_id(Path::new("/tmp/b/refs.bib"));
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("refs-"));
        assert!(b.as_str().starts_with("refs-"));
    }

    #[test]
    fn test_stem_is_url_safe() {
        let id = derive_library_id(Path::new("/tmp/My Thesis (final).bib"));
        let stem = id.as_str().rsplit_once('-').unwrap().0;
        assert_eq!(stem, "my_thesis__final_");
        assert_eq!(id.as_str().len(), stem.len() + 1 + HASH_PREFIX_LEN);
    }
}
