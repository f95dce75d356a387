//! ADD command - Create an entry from a BibTeX or CSL-JSON document.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, fetch_text, output, read_input};

/// Arguments for the add command.
#[derive(Args)]
pub struct AddArgs {
    /// Library to add the entry to
    pub library_id: String,

    /// Document holding exactly one entry (path, @path, or - for stdin)
    pub input: String,

    /// Format of the document (bibtex or csl-json)
    #[arg(short, long, default_value = "bibtex")]
    pub format: String,
}

/// Summary of the created entry.
#[derive(Debug, Deserialize, Serialize)]
pub struct Created {
    pub id: String,
    pub version: u64,
    pub location: String,
}

impl HumanReadable for Created {
    fn print_human(&self) {
        println!("{}", "Entry created successfully!".green().bold());
        println!();
        println!("  {} {}", "ID:".cyan(), self.id);
        println!("  {} {}", "Version:".cyan(), self.version);
        println!("  {} {}", "Location:".cyan(), self.location);
    }
}

fn media_type(format: &str) -> &str {
    match format {
        "bibtex" | "bib" | "native" => "application/x-bibtex",
        "csl-json" | "csl" | "json" => "application/vnd.citationstyles.csl+json",
        other => other,
    }
}

/// Execute the add command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: AddArgs) -> Result<()> {
    let body = read_input(&args.input)?;
    let url = format!("{}/libraries/{}/entries", base_url, args.library_id);

    let request = client
        .post(&url)
        .header(CONTENT_TYPE, media_type(&args.format))
        .query(&[("format", "csl-json")])
        .body(body);
    let response = fetch_text(request).await?;

    let item: serde_json::Value = serde_json::from_str(&response.body)?;
    let id = item
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let created = Created {
        location: format!("/libraries/{}/entries/{}", args.library_id, id),
        id,
        version: response
            .version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
    };
    output(&created, human)
}
