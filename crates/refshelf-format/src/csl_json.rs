//! CSL-JSON, the interchange format.
//!
//! Entries map onto CSL variables where a counterpart exists. Every other
//! field is carried in a `custom` object so that decoding restores it, and
//! `custom.bibtexType` records the entry type when the CSL type alone would
//! decode to a different one (`inbook` and `incollection` are both `chapter`).
//! Name lists that do not read back verbatim from their CSL form, such as
//! `Jane Doe`, keep their spelling in `custom.bibtexAuthor` / `custom.bibtexEditor`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use refshelf_core::names::format_name_list;
use refshelf_core::{Entry, EntryId, EntryType, Fields, Name, parse_name_list};

use crate::codec::{Codec, CodecError, Malformed};

/// Media type of CSL-JSON.
pub const MEDIA_TYPE: &str = "application/vnd.citationstyles.csl+json";

const CUSTOM: &str = "custom";
const BIBTEX_TYPE: &str = "bibtexType";

/// Name field → `custom` key holding its original spelling.
const NAME_SPELLINGS: &[(&str, &str)] = &[("author", "bibtexAuthor"), ("editor", "bibtexEditor")];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// BibTeX field → CSL variable for fields that map one to one.
const SIMPLE_FIELDS: &[(&str, &str)] = &[
    ("title", "title"),
    ("pages", "page"),
    ("volume", "volume"),
    ("number", "issue"),
    ("address", "publisher-place"),
    ("edition", "edition"),
    ("series", "collection-title"),
    ("doi", "DOI"),
    ("url", "URL"),
    ("isbn", "ISBN"),
    ("issn", "ISSN"),
    ("abstract", "abstract"),
    ("note", "note"),
    ("keywords", "keyword"),
    ("chapter", "chapter-number"),
    ("language", "language"),
];

/// Codec for CSL-JSON. A single entry is an object, a set is an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct CslJsonCodec;

impl Codec for CslJsonCodec {
    fn name(&self) -> &'static str {
        "csl-json"
    }

    fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    fn encode_entry(&self, entry: &Entry) -> Result<Vec<u8>, CodecError> {
        Ok(format!("{:#}", to_csl(entry)).into_bytes())
    }

    fn encode_entries(&self, entries: &[Entry]) -> Result<Vec<u8>, CodecError> {
        let items = Value::Array(entries.iter().map(to_csl).collect());
        Ok(format!("{:#}", items).into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Entry>, CodecError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            let message = e.to_string();
            let message = message.split(" at line ").next().unwrap_or(&message);
            Malformed::new(message).at(e.line(), e.column())
        })?;
        let entries = match &value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| from_csl(item, &format!("[{}]", i)))
                .collect::<Result<Vec<_>, _>>()?,
            _ => vec![from_csl(&value, "")?],
        };
        Ok(entries)
    }
}

// ============================================================================
// Type and field mapping
// ============================================================================

fn csl_type(entry_type: &EntryType) -> &'static str {
    match entry_type {
        EntryType::Article => "article-journal",
        EntryType::Book | EntryType::Proceedings => "book",
        EntryType::Booklet => "pamphlet",
        EntryType::InBook | EntryType::InCollection => "chapter",
        EntryType::InProceedings => "paper-conference",
        EntryType::Manual | EntryType::TechReport => "report",
        EntryType::MastersThesis | EntryType::PhdThesis | EntryType::Thesis => "thesis",
        EntryType::Online => "webpage",
        EntryType::Unpublished => "manuscript",
        EntryType::Misc | EntryType::Other(_) => "document",
    }
}

fn bibtex_type(csl: &str) -> EntryType {
    match csl {
        "article" | "article-journal" | "article-magazine" | "article-newspaper" => {
            EntryType::Article
        }
        "book" => EntryType::Book,
        "pamphlet" => EntryType::Booklet,
        "chapter" => EntryType::InCollection,
        "paper-conference" => EntryType::InProceedings,
        "report" => EntryType::TechReport,
        "thesis" => EntryType::PhdThesis,
        "webpage" | "post-weblog" => EntryType::Online,
        "manuscript" => EntryType::Unpublished,
        _ => EntryType::Misc,
    }
}

fn container_field(entry_type: &EntryType) -> &'static str {
    match entry_type {
        EntryType::Article => "journal",
        _ => "booktitle",
    }
}

fn publisher_field(entry_type: &EntryType) -> &'static str {
    match entry_type {
        t if t.is_thesis() => "school",
        EntryType::TechReport => "institution",
        _ => "publisher",
    }
}

/// Month number from `#jan#`, `jan`, `January` or `1`.
fn month_number(value: &str) -> Option<u8> {
    let value = value.trim().trim_matches('#').to_lowercase();
    if let Ok(n) = value.parse::<u8>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let prefix: String = value.chars().take(3).collect();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| (i + 1) as u8)
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CslName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    given: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    non_dropping_particle: Option<String>,
    #[serde(default, skip_serializing)]
    dropping_particle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    literal: Option<String>,
}

impl From<Name> for CslName {
    fn from(name: Name) -> Self {
        Self {
            family: name.family,
            given: name.given,
            non_dropping_particle: name.particle,
            dropping_particle: None,
            suffix: name.suffix,
            literal: name.literal,
        }
    }
}

impl From<CslName> for Name {
    fn from(name: CslName) -> Self {
        Self {
            family: name.family,
            given: name.given,
            particle: name.non_dropping_particle.or(name.dropping_particle),
            suffix: name.suffix,
            literal: name.literal,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn to_csl(entry: &Entry) -> Value {
    let mut object = Map::new();
    let mut custom = Map::new();

    object.insert("id".into(), Value::from(entry.id.as_str()));
    let ty = csl_type(&entry.entry_type);
    object.insert("type".into(), Value::from(ty));
    if bibtex_type(ty) != entry.entry_type {
        custom.insert(BIBTEX_TYPE.into(), Value::from(entry.entry_type.as_str()));
    }

    let (issued, month_used) = issued(&entry.fields);
    let year_used = issued.is_some();
    if let Some(issued) = issued {
        object.insert("issued".into(), issued);
    }

    let container = container_field(&entry.entry_type);
    let publisher = publisher_field(&entry.entry_type);

    for (name, value) in entry.fields.iter() {
        let variable = match name {
            "author" | "editor" => {
                let names = parse_name_list(value);
                if names.is_empty() {
                    None
                } else {
                    if format_name_list(&names) != value {
                        if let Some((_, key)) = NAME_SPELLINGS.iter().find(|(field, _)| *field == name) {
                            custom.insert((*key).into(), Value::from(value));
                        }
                    }
                    let names: Vec<CslName> = names.into_iter().map(CslName::from).collect();
                    object.insert(name.into(), serde_json::json!(names));
                    continue;
                }
            }
            "year" if year_used => continue,
            "month" if month_used => continue,
            n if n == container => Some("container-title"),
            n if n == publisher => Some("publisher"),
            n => SIMPLE_FIELDS
                .iter()
                .find(|(field, _)| *field == n)
                .map(|(_, variable)| *variable),
        };
        match variable {
            Some(variable) => object.insert(variable.into(), Value::from(value)),
            None => custom.insert(name.into(), Value::from(value)),
        };
    }

    if !custom.is_empty() {
        object.insert(CUSTOM.into(), Value::Object(custom));
    }
    Value::Object(object)
}

/// Builds `issued` from year and month. Returns whether the month was used.
fn issued(fields: &Fields) -> (Option<Value>, bool) {
    let Some(year) = fields.get("year") else {
        return (None, false);
    };
    let year = year.trim();
    match year.parse::<i64>() {
        Ok(y) => match fields.get("month").and_then(month_number) {
            Some(m) => (Some(serde_json::json!({ "date-parts": [[y, m]] })), true),
            None => (Some(serde_json::json!({ "date-parts": [[y]] })), false),
        },
        Err(_) => (Some(serde_json::json!({ "literal": year })), false),
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn path_of(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

fn scalar(value: &Value, path: &str) -> Result<String, Malformed> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Malformed::new("expected a string").in_field(path)),
    }
}

fn from_csl(value: &Value, base: &str) -> Result<Entry, Malformed> {
    let object = value.as_object().ok_or_else(|| {
        let field = if base.is_empty() { "$" } else { base };
        Malformed::new("expected a JSON object").in_field(field)
    })?;

    let id_path = path_of(base, "id");
    let id = object
        .get("id")
        .ok_or_else(|| Malformed::new("missing `id`").in_field(&id_path))
        .and_then(|v| scalar(v, &id_path))?;
    let id = EntryId::new(id)
        .map_err(|e| Malformed::new(format!("invalid citation key: {}", e)).in_field(&id_path))?;

    let type_path = path_of(base, "type");
    let csl = object
        .get("type")
        .ok_or_else(|| Malformed::new("missing `type`").in_field(&type_path))
        .and_then(|v| scalar(v, &type_path))?;

    let custom_path = path_of(base, CUSTOM);
    let custom = match object.get(CUSTOM) {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(Malformed::new("expected an object").in_field(&custom_path)),
    };

    let entry_type = match custom.get(BIBTEX_TYPE) {
        Some(v) => {
            let Ok(t) = scalar(v, &path_of(&custom_path, BIBTEX_TYPE))?.parse::<EntryType>();
            t
        }
        None => bibtex_type(&csl),
    };

    let container = container_field(&entry_type);
    let publisher = publisher_field(&entry_type);
    let mut fields = Fields::new();

    for (key, value) in object {
        let path = path_of(base, key);
        match key.as_str() {
            "id" | "type" | CUSTOM => {}
            "author" | "editor" => {
                fields.set(key, decode_names(value, &path)?);
            }
            "issued" => decode_issued(value, &path, &mut fields)?,
            "container-title" => {
                fields.set(container, scalar(value, &path)?);
            }
            "publisher" => {
                fields.set(publisher, scalar(value, &path)?);
            }
            other => {
                let field = SIMPLE_FIELDS
                    .iter()
                    .find(|(_, variable)| *variable == other)
                    .map(|(field, _)| *field);
                match (field, value) {
                    (Some(field), _) => {
                        fields.set(field, scalar(value, &path)?);
                    }
                    (None, Value::String(_) | Value::Number(_)) => {
                        fields.set(other, scalar(value, &path)?);
                    }
                    (None, _) => {
                        tracing::debug!(variable = %other, "Ignoring structured CSL variable without BibTeX counterpart");
                    }
                }
            }
        }
    }

    for (key, value) in &custom {
        if key == BIBTEX_TYPE {
            continue;
        }
        let field = NAME_SPELLINGS
            .iter()
            .find(|(_, spelling)| *spelling == key.as_str())
            .map_or(key.as_str(), |(field, _)| *field);
        fields.set(field, scalar(value, &path_of(&custom_path, key))?);
    }

    let mut entry = Entry::new(id, entry_type);
    entry.fields = fields;
    Ok(entry)
}

fn decode_names(value: &Value, path: &str) -> Result<String, Malformed> {
    let items = value
        .as_array()
        .ok_or_else(|| Malformed::new("expected an array of names").in_field(path))?;
    let names = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<CslName>(item.clone())
                .map(Name::from)
                .map_err(|e| {
                    Malformed::new(format!("invalid name: {}", e)).in_field(format!("{}[{}]", path, i))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format_name_list(&names))
}

fn decode_issued(value: &Value, path: &str, fields: &mut Fields) -> Result<(), Malformed> {
    let object = value
        .as_object()
        .ok_or_else(|| Malformed::new("expected a date object").in_field(path))?;

    if let Some(parts) = object.get("date-parts") {
        let parts_path = path_of(path, "date-parts");
        let first = parts
            .as_array()
            .and_then(|outer| outer.first())
            .and_then(Value::as_array)
            .ok_or_else(|| Malformed::new("expected [[year, month?, day?]]").in_field(&parts_path))?;
        if let Some(year) = first.first() {
            fields.set("year", scalar(year, &format!("{}[0][0]", parts_path))?);
        }
        if let Some(month) = first.get(1) {
            let month_path = format!("{}[0][1]", parts_path);
            let number = scalar(month, &month_path)?
                .parse::<usize>()
                .ok()
                .filter(|m| (1..=12).contains(m))
                .ok_or_else(|| Malformed::new("month must be between 1 and 12").in_field(&month_path))?;
            fields.set("month", format!("#{}#", MONTHS[number - 1]));
        }
        return Ok(());
    }

    for key in ["literal", "raw"] {
        if let Some(text) = object.get(key) {
            fields.set("year", scalar(text, &path_of(path, key))?);
            return Ok(());
        }
    }
    Err(Malformed::new("expected `date-parts`, `literal` or `raw`").in_field(path))
}
