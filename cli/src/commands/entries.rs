//! ENTRIES command - List entries of a library.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HumanReadable, fetch_text, make_request, output, truncate};

/// Arguments for the entries command.
#[derive(Args)]
pub struct EntriesArgs {
    /// Library to list
    pub library_id: String,

    /// Only entries of this type (e.g. article, book)
    #[arg(short = 't', long = "type")]
    pub entry_type: Option<String>,

    /// Case-insensitive text to search for in keys and fields
    #[arg(short, long)]
    pub query: Option<String>,

    /// Number of matching entries to skip
    #[arg(long)]
    pub offset: Option<usize>,

    /// Maximum number of entries to return
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Print the raw body in this format instead (e.g. bibtex)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Entries as CSL-JSON items.
#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EntryList(pub Vec<Value>);

fn year(item: &Value) -> Option<String> {
    item.pointer("/issued/date-parts/0/0").map(|y| match y {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn first_author(item: &Value) -> Option<String> {
    let author = item.pointer("/author/0")?;
    author
        .get("family")
        .or_else(|| author.get("literal"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl HumanReadable for EntryList {
    fn print_human(&self) {
        println!("{}", "Entries".green().bold());
        println!("{}", "=".repeat(80));
        println!();

        if self.0.is_empty() {
            println!("  {}", "(No matching entries)".dimmed());
            return;
        }

        for item in &self.0 {
            let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
            let kind = item.get("type").and_then(Value::as_str).unwrap_or("");
            let title = item.get("title").and_then(Value::as_str).unwrap_or("");
            let byline = match (first_author(item), year(item)) {
                (Some(author), Some(year)) => format!("{} {}", author, year),
                (Some(author), None) => author,
                (None, Some(year)) => year,
                (None, None) => String::new(),
            };
            println!(
                "  {:<20} {:<16} {} {}",
                truncate(id, 20).yellow(),
                kind.dimmed(),
                truncate(title, 50),
                byline.cyan()
            );
        }
        println!();
        println!("  {} {}", "Total:".cyan(), self.0.len());
    }
}

/// Execute the entries command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: EntriesArgs) -> Result<()> {
    let url = format!("{}/libraries/{}/entries", base_url, args.library_id);

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(entry_type) = args.entry_type {
        query.push(("type", entry_type));
    }
    if let Some(text) = args.query {
        query.push(("q", text));
    }
    if let Some(offset) = args.offset {
        query.push(("offset", offset.to_string()));
    }
    if let Some(limit) = args.limit {
        query.push(("limit", limit.to_string()));
    }

    if let Some(format) = args.format {
        query.push(("format", format));
        let response = fetch_text(client.get(&url).query(&query)).await?;
        print!("{}", response.body);
        return Ok(());
    }

    query.push(("format", "csl-json".to_string()));
    let entries: EntryList = make_request(client.get(&url).query(&query)).await?;
    output(&entries, human)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_byline_parts() {
        let item = json!({
            "id": "doe2020",
            "author": [{"family": "Doe", "given": "Jane"}],
            "issued": {"date-parts": [[2020]]}
        });
        assert_eq!(first_author(&item).as_deref(), Some("Doe"));
        assert_eq!(year(&item).as_deref(), Some("2020"));
        assert!(year(&json!({"id": "x"})).is_none());
    }
}
