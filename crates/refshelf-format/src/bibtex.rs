//! BibTeX, the native format.
//!
//! The reader understands `@string` macros, `#` concatenation, braced and
//! quoted values and bare numbers. References to macros that are not defined
//! in the payload (the month abbreviations, typically) are kept as `#name#` so
//! that the writer can emit them again as bare macros.
//!
//! The writer wraps every value in braces except `month`, where `#name#`
//! references become bare macro names joined with ` # `:
//!
//! ```
//! use refshelf_format::bibtex::write_month;
//!
//! assert_eq!(write_month("#jan# - #feb#"), "jan # { - } # feb");
//! assert_eq!(write_month("te##xt"), "{text}");
//! ```

use std::collections::{HashMap, HashSet};

use refshelf_core::validation::check_braces;
use refshelf_core::{Entry, EntryId, EntryType, Fields};

use crate::codec::{Codec, CodecError, Malformed, utf8};

/// Media type of the native format.
pub const MEDIA_TYPE: &str = "application/x-bibtex";

/// Codec for BibTeX text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibtexCodec;

impl Codec for BibtexCodec {
    fn name(&self) -> &'static str {
        "bibtex"
    }

    fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    fn encode_entry(&self, entry: &Entry) -> Result<Vec<u8>, CodecError> {
        Ok(write_entry(entry)?.into_bytes())
    }

    fn encode_entries(&self, entries: &[Entry]) -> Result<Vec<u8>, CodecError> {
        let written = entries
            .iter()
            .map(write_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(written.join("\n").into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Entry>, CodecError> {
        Ok(parse_library(utf8(bytes)?)?.entries)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Result of reading a whole `.bib` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLibrary {
    /// Encoding declared in a leading `% Encoding: X` comment.
    pub encoding: Option<String>,
    /// Entries in file order.
    pub entries: Vec<Entry>,
}

/// Parse BibTeX text.
///
/// Duplicate citation keys are reported as malformed input.
pub fn parse_library(input: &str) -> Result<ParsedLibrary, CodecError> {
    let encoding = declared_encoding(input);
    let entries = Parser::new(input).entries()?;
    Ok(ParsedLibrary { encoding, entries })
}

fn declared_encoding(input: &str) -> Option<String> {
    for line in input.lines() {
        let line = line.trim();
        if line.starts_with('@') {
            break;
        }
        if let Some(rest) = line.strip_prefix('%') {
            if let Some(encoding) = rest.trim().strip_prefix("Encoding:") {
                let encoding = encoding.trim();
                if !encoding.is_empty() {
                    return Some(encoding.to_string());
                }
            }
        }
    }
    None
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '+' | '/')
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    macros: HashMap<String, String>,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            macros: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn location(&self, pos: usize) -> (usize, usize) {
        let mut line = 1;
        let mut column = 1;
        for c in &self.chars[..pos.min(self.chars.len())] {
            if *c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> Malformed {
        let (line, column) = self.location(pos);
        Malformed::new(message).at(line, column)
    }

    fn error(&self, message: impl Into<String>) -> Malformed {
        self.error_at(self.pos, message)
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn entries(mut self) -> Result<Vec<Entry>, Malformed> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        while let Some(offset) = self.chars[self.pos..].iter().position(|c| *c == '@') {
            let start = self.pos + offset;
            self.pos = start + 1;
            self.skip_whitespace();

            let kind = self.identifier();
            if kind.is_empty() {
                return Err(self.error("expected entry type after '@'"));
            }
            self.skip_whitespace();
            let close = match self.peek() {
                Some('{') => '}',
                Some('(') => ')',
                _ => return Err(self.error(format!("expected '{{' or '(' after @{}", kind))),
            };
            self.pos += 1;

            match kind.to_lowercase().as_str() {
                "comment" | "preamble" => self.skip_block(start, close)?,
                "string" => self.string_definition(close)?,
                _ => {
                    let entry = self.entry(&kind, close)?;
                    if !seen.insert(entry.id.clone()) {
                        return Err(self.error_at(
                            start,
                            format!("duplicate citation key {}", entry.id),
                        ));
                    }
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn skip_block(&mut self, start: usize, close: char) -> Result<(), Malformed> {
        let open = if close == '}' { '{' } else { '(' };
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(self.error_at(start, "unterminated block"))
    }

    fn string_definition(&mut self, close: char) -> Result<(), Malformed> {
        self.skip_whitespace();
        let name = self.identifier();
        if name.is_empty() {
            return Err(self.error("expected macro name in @string"));
        }
        self.skip_whitespace();
        self.expect('=', &name)?;
        let value = self.value(&name)?;
        self.skip_whitespace();
        self.expect(close, &name)?;
        self.macros.insert(name.to_lowercase(), value);
        Ok(())
    }

    fn expect(&mut self, expected: char, field: &str) -> Result<(), Malformed> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            let found = match self.peek() {
                Some(c) => format!("{:?}", c),
                None => "end of input".to_string(),
            };
            Err(self
                .error(format!("expected {:?}, found {}", expected, found))
                .in_field(field))
        }
    }

    fn entry(&mut self, kind: &str, close: char) -> Result<Entry, Malformed> {
        self.skip_whitespace();
        let key_start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c != ',' && c != close && !c.is_whitespace())
        {
            self.pos += 1;
        }
        let key: String = self.chars[key_start..self.pos].iter().collect();
        let id = EntryId::new(key)
            .map_err(|e| self.error_at(key_start, format!("invalid citation key: {}", e)))?;

        let Ok(entry_type) = kind.parse::<EntryType>();
        let mut fields = Fields::new();

        self.skip_whitespace();
        match self.peek() {
            Some(',') => self.pos += 1,
            Some(c) if c == close => {
                self.pos += 1;
                return Ok(Entry::new(id, entry_type));
            }
            _ => return Err(self.error("expected ',' after citation key")),
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unexpected end of input inside entry")),
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }

            let name = self.identifier();
            if name.is_empty() {
                return Err(self.error("expected field name"));
            }
            self.skip_whitespace();
            self.expect('=', &name)?;
            let value = self.value(&name)?;
            fields.set(&name, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    return Err(self
                        .error("expected ',' or end of entry")
                        .in_field(name));
                }
            }
        }

        let mut entry = Entry::new(id, entry_type);
        entry.fields = fields;
        Ok(entry)
    }

    fn value(&mut self, field: &str) -> Result<String, Malformed> {
        let mut value = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('{') => {
                    self.pos += 1;
                    value.push_str(&self.delimited(None, field)?);
                }
                Some('"') => {
                    self.pos += 1;
                    value.push_str(&self.delimited(Some('"'), field)?);
                }
                Some(c) if c.is_ascii_digit() => {
                    while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                        value.push(d);
                        self.pos += 1;
                    }
                }
                Some(c) if is_identifier_char(c) => {
                    let name = self.identifier();
                    match self.macros.get(&name.to_lowercase()) {
                        Some(expansion) => value.push_str(expansion),
                        None => {
                            value.push('#');
                            value.push_str(&name);
                            value.push('#');
                        }
                    }
                }
                _ => return Err(self.error("expected field value").in_field(field)),
            }

            self.skip_whitespace();
            if self.peek() == Some('#') {
                self.pos += 1;
            } else {
                return Ok(value);
            }
        }
    }

    /// Reads a braced value (`terminator == None`, opening brace consumed) or a
    /// quoted one. Nested braces are kept; escaped braces do not nest.
    fn delimited(&mut self, terminator: Option<char>, field: &str) -> Result<String, Malformed> {
        let start = self.pos.saturating_sub(1);
        let mut depth = 0usize;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    out.push(c);
                    if let Some(next) = self.peek() {
                        out.push(next);
                        self.pos += 1;
                    }
                }
                '{' => {
                    depth += 1;
                    out.push(c);
                }
                '}' if depth == 0 => {
                    if terminator.is_none() {
                        return Ok(out);
                    }
                    return Err(self
                        .error_at(self.pos - 1, "unbalanced closing brace")
                        .in_field(field));
                }
                '}' => {
                    depth -= 1;
                    out.push(c);
                }
                c if Some(c) == terminator && depth == 0 => return Ok(out),
                c => out.push(c),
            }
        }
        Err(self
            .error_at(start, "unterminated field value")
            .in_field(field))
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Write one entry as BibTeX.
pub fn write_entry(entry: &Entry) -> Result<String, CodecError> {
    let mut out = format!("@{}{{{},\n", entry.entry_type.display_name(), entry.id);
    for (name, value) in entry.fields.iter() {
        check_braces(value).map_err(|reason| CodecError::Unencodable {
            entry: entry.id.to_string(),
            field: name.to_string(),
            reason,
        })?;
        let written = if name == "month" {
            write_month(value)
        } else {
            format!("{{{}}}", value)
        };
        out.push_str(&format!("  {} = {},\n", name, written));
    }
    out.push_str("}\n");
    Ok(out)
}

enum Segment {
    Literal(String),
    Macro(String),
}

/// Write a `month` value, turning `#name#` references into bare macros.
///
/// An empty reference (`##`) is dropped and an unpaired or escaped `#` is kept
/// as literal text.
pub fn write_month(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            literal.push(c);
            literal.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '#' {
            if let Some(end) = (i + 1..chars.len()).find(|&j| chars[j] == '#') {
                let name: String = chars[i + 1..end].iter().collect();
                if !name.is_empty() {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Macro(name));
                }
                i = end + 1;
                continue;
            }
        }
        literal.push(c);
        i += 1;
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    if segments.is_empty() {
        return "{}".to_string();
    }
    segments
        .into_iter()
        .map(|s| match s {
            Segment::Literal(text) => format!("{{{}}}", text),
            Segment::Macro(name) => name,
        })
        .collect::<Vec<_>>()
        .join(" # ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"% Encoding: UTF-8

@String{acm = "ACM Press"}

@Comment{jabref-meta: databaseType:bibtex;}

@Preamble{ "\newcommand{\noop}[1]{}" }

Free text between entries is ignored.

@Article{doe2020,
  Author    = {Doe, Jane and Smith, John},
  title     = "A {Study} of Things",
  journal   = {Journal of Stuff},
  year      = 2020,
  month     = jan,
  publisher = acm # { Inc.},
}

@book(knuth1984, title = {The \TeX book}, year = {1984})
"#;

    fn malformed(result: Result<ParsedLibrary, CodecError>) -> Malformed {
        match result {
            Err(CodecError::Malformed(m)) => m,
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sample_library() {
        let parsed = parse_library(SAMPLE).unwrap();
        assert_eq!(parsed.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(parsed.entries.len(), 2);

        let doe = &parsed.entries[0];
        assert_eq!(doe.id.as_str(), "doe2020");
        assert_eq!(doe.entry_type, EntryType::Article);
        assert_eq!(doe.field("author"), Some("Doe, Jane and Smith, John"));
        assert_eq!(doe.field("title"), Some("A {Study} of Things"));
        assert_eq!(doe.field("year"), Some("2020"));
        assert_eq!(doe.field("month"), Some("#jan#"));
        assert_eq!(doe.field("publisher"), Some("ACM Press Inc."));

        let knuth = &parsed.entries[1];
        assert_eq!(knuth.entry_type, EntryType::Book);
        assert_eq!(knuth.field("title"), Some("The \\TeX book"));
    }

    #[test]
    fn test_field_order_is_preserved() {
        let parsed = parse_library(SAMPLE).unwrap();
        let names: Vec<_> = parsed.entries[0].fields.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["author", "title", "journal", "year", "month", "publisher"]
        );
    }

    #[test]
    fn test_entry_without_fields() {
        let parsed = parse_library("@misc{lonely}").unwrap();
        assert_eq!(parsed.entries[0].id.as_str(), "lonely");
        assert!(parsed.entries[0].fields.is_empty());
    }

    #[test]
    fn test_unknown_type_preserved() {
        let parsed = parse_library("@Dataset{d1, title = {T}}").unwrap();
        assert_eq!(
            parsed.entries[0].entry_type,
            EntryType::Other("dataset".to_string())
        );
    }

    #[test]
    fn test_unterminated_value_reports_field_and_position() {
        let m = malformed(parse_library("@article{a,\n  title = {open {\n}"));
        assert_eq!(m.field.as_deref(), Some("title"));
        assert_eq!(m.line, Some(2));
        assert_eq!(m.column, Some(11));
    }

    #[test]
    fn test_missing_equals_reports_field() {
        let m = malformed(parse_library("@article{a,\n  title {x}\n}"));
        assert_eq!(m.field.as_deref(), Some("title"));
        assert_eq!(m.line, Some(2));
    }

    #[test]
    fn test_duplicate_key_is_malformed() {
        let m = malformed(parse_library("@misc{a, title={1}}\n@misc{a, title={2}}"));
        assert!(m.message.contains("duplicate citation key a"));
        assert_eq!(m.line, Some(2));
    }

    #[test]
    fn test_invalid_key_is_malformed() {
        let m = malformed(parse_library("@misc{a\"b, title={1}}"));
        assert!(m.message.contains("invalid citation key"));
    }

    #[test]
    fn test_write_entry_layout() {
        let entry = Entry::new(EntryId::new("doe2020").unwrap(), EntryType::InProceedings)
            .with_field("title", "A")
            .with_field("month", "#mar#");
        assert_eq!(
            write_entry(&entry).unwrap(),
            "@InProceedings{doe2020,\n  title = {A},\n  month = mar,\n}\n"
        );
    }

    #[test]
    fn test_unbalanced_value_is_unencodable() {
        let entry = Entry::new(EntryId::new("e").unwrap(), EntryType::Misc).with_field("title", "{");
        assert!(matches!(
            write_entry(&entry),
            Err(CodecError::Unencodable { .. })
        ));
    }

    #[test]
    fn test_trailing_backslash_is_unencodable() {
        let entry = Entry::new(EntryId::new("e").unwrap(), EntryType::Misc)
            .with_field("note", "C:\\dir\\");
        match write_entry(&entry) {
            Err(CodecError::Unencodable { field, .. }) => assert_eq!(field, "note"),
            other => panic!("expected unencodable, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_keeps_escaped_trailing_backslash() {
        let entry = Entry::new(EntryId::new("e1").unwrap(), EntryType::Misc)
            .with_field("note", "C:\\dir\\\\");
        let codec = BibtexCodec;
        let decoded = codec
            .decode_entry(&codec.encode_entry(&entry).unwrap())
            .unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_month_writer() {
        assert_eq!(write_month("#jan# - #feb#"), "jan # { - } # feb");
        assert_eq!(write_month("#text"), "{#text}");
        assert_eq!(write_month("\\#text"), "{\\#text}");
        assert_eq!(write_month("te##xt"), "{text}");
        assert_eq!(write_month("  text      "), "{  text      }");
        assert_eq!(write_month(""), "{}");
    }

    #[test]
    fn test_round_trip_through_codec() {
        let codec = BibtexCodec;
        let original = parse_library(SAMPLE).unwrap().entries;
        let bytes = codec.encode_entries(&original).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_round_trip_keeps_escaped_braces_and_multiline_text() {
        let entry = Entry::new(EntryId::new("e1").unwrap(), EntryType::Misc)
            .with_field("note", "a \\{ b\nsecond line")
            .with_field("month", "#jan# - #feb#");
        let codec = BibtexCodec;
        let decoded = codec
            .decode_entry(&codec.encode_entry(&entry).unwrap())
            .unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_entry_requires_single_entry() {
        let codec = BibtexCodec;
        let result = codec.decode_entry(b"@misc{a}\n@misc{b}");
        assert_eq!(result, Err(CodecError::ExpectedSingleEntry { found: 2 }));
    }
}
