//! The codec interface shared by every bidirectional wire format.

use std::fmt;

use refshelf_core::Entry;

/// Location and description of a decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Malformed {
    /// 1-based line, when the input is line oriented.
    pub line: Option<usize>,
    /// 1-based column.
    pub column: Option<usize>,
    /// Field (or JSON path) being read when the error occurred.
    pub field: Option<String>,
    pub message: String,
}

impl Malformed {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    #[must_use]
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "line {}, column {}: ", line, column)?,
            (Some(line), None) => write!(f, "line {}: ", line)?,
            _ => {}
        }
        f.write_str(&self.message)?;
        if let Some(field) = &self.field {
            write!(f, " (field `{}`)", field)?;
        }
        Ok(())
    }
}

/// Errors produced by codecs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The payload could not be decoded.
    #[error("malformed input: {0}")]
    Malformed(Malformed),

    /// A single entry was required but the payload held a different number.
    #[error("expected exactly one entry, found {found}")]
    ExpectedSingleEntry { found: usize },

    /// The entry holds a value this format cannot represent.
    #[error("cannot encode field `{field}` of entry {entry}: {reason}")]
    Unencodable {
        entry: String,
        field: String,
        reason: String,
    },
}

impl From<Malformed> for CodecError {
    fn from(m: Malformed) -> Self {
        Self::Malformed(m)
    }
}

/// A converter between entries and one wire format.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Short format name used in `?format=` (e.g. `bibtex`).
    fn name(&self) -> &'static str;

    /// Primary media type.
    fn media_type(&self) -> &'static str;

    /// Encode a single entry.
    fn encode_entry(&self, entry: &Entry) -> Result<Vec<u8>, CodecError>;

    /// Encode an ordered entry set.
    fn encode_entries(&self, entries: &[Entry]) -> Result<Vec<u8>, CodecError>;

    /// Decode every entry in the payload.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Entry>, CodecError>;

    /// Decode a payload that must hold exactly one entry.
    fn decode_entry(&self, bytes: &[u8]) -> Result<Entry, CodecError> {
        let mut entries = self.decode(bytes)?;
        if entries.len() != 1 {
            return Err(CodecError::ExpectedSingleEntry {
                found: entries.len(),
            });
        }
        Ok(entries.remove(0))
    }
}

/// Interpret a payload as UTF-8 text, reporting the position of the first bad byte.
pub(crate) fn utf8(bytes: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(bytes).map_err(|e| {
        let valid = &bytes[..e.valid_up_to()];
        let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
        let column = valid.iter().rev().take_while(|b| **b != b'\n').count() + 1;
        Malformed::new("payload is not valid UTF-8")
            .at(line, column)
            .into()
    })
}
