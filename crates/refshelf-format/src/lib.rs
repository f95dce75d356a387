//! refshelf-format: wire formats and citation rendering for refshelf
//!
//! This crate provides:
//! - [`Codec`]: the bidirectional converter interface, with the native
//!   [`BibtexCodec`] and the interchange [`CslJsonCodec`]
//! - [`FormatRegistry`]: every representation the server can produce, looked
//!   up by name, alias or media type
//! - [`style`]: citation style definitions and the catalogs that resolve them
//! - [`CitationEngine`]: deterministic bibliography and in-text rendering
//!
//! ```
//! use std::sync::Arc;
//! use refshelf_core::{Entry, EntryId, EntryType};
//! use refshelf_format::{BuiltinCatalog, CancelFlag, CitationEngine, RenderMode};
//!
//! let engine = CitationEngine::new(Arc::new(BuiltinCatalog::load().unwrap()));
//! let entry = Entry::new(EntryId::new("knuth1984").unwrap(), EntryType::Book)
//!     .with_field("author", "Knuth, Donald E.")
//!     .with_field("title", "The TeXbook")
//!     .with_field("year", "1984");
//! let out = engine
//!     .render_named(&[entry], "apa", RenderMode::Inline, &CancelFlag::new())
//!     .unwrap();
//! assert_eq!(out.text, "(Knuth, 1984)");
//! ```

pub mod bibtex;
pub mod cache;
pub mod codec;
pub mod csl_json;
pub mod registry;
pub mod render;
pub mod style;

pub use bibtex::{BibtexCodec, ParsedLibrary, parse_library};
pub use cache::{CacheConfig, CacheStats, StyleCache};
pub use codec::{Codec, CodecError, Malformed};
pub use csl_json::CslJsonCodec;
pub use registry::{
    FormatDescriptor, FormatRegistry, FormatRegistryBuilder, FormatTarget, RegistryError,
    RenderedLayout,
};
pub use render::{
    CancelFlag, CitationEngine, RenderError, RenderFailure, RenderMode, RenderOutput,
    RenderedItem, UnknownRenderMode,
};
pub use style::{
    BuiltinCatalog, CitationStyle, DirectoryCatalog, LayeredCatalog, StyleCatalog, StyleError,
    StyleHandle,
};
