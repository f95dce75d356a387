//! refshelf-core: bibliographic data model for refshelf
//!
//! This crate provides:
//! - [`Entry`], [`EntryType`], [`Fields`]: a single bibliographic record
//! - [`Library`] and [`LibraryMetadata`]: an ordered collection of entries
//! - [`Version`]: optimistic-concurrency token carried by stored entries
//! - [`names`]: parsing of BibTeX name lists (`Doe, Jane and Smith, John`)
//! - [`validation`]: required-field and integrity checks applied before writes
//!
//! The crate has no knowledge of wire formats or storage; codecs live in
//! `refshelf-format` and the accessor in `refshelf-store`.

pub mod identity;
pub mod names;
pub mod types;
pub mod validation;

pub use identity::derive_library_id;
pub use names::{Name, parse_name_list};
pub use types::{
    Entry, EntryId, EntryIdParseError, EntryType, Fields, Library, LibraryId, LibraryMetadata,
    Version, VersionParseError,
};
pub use validation::{FieldProblem, ValidationError, validate_entry};
