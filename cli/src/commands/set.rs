//! SET command - Change or clear a single field of an entry.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::header::{CONTENT_TYPE, IF_MATCH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{HumanReadable, if_match, make_request, output};

/// Arguments for the set command.
#[derive(Args)]
pub struct SetArgs {
    /// Library containing the entry
    pub library_id: String,

    /// Entry key
    pub entry_id: String,

    /// Field name, e.g. title or doi
    pub field: String,

    /// New value; omit to clear the field
    pub value: Option<String>,

    /// Version the change is based on (see `show --human`)
    #[arg(short, long)]
    pub version: u64,
}

/// Entry as returned after a field update.
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdatedEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub fields: BTreeMap<String, String>,
    pub version: u64,
}

impl HumanReadable for UpdatedEntry {
    fn print_human(&self) {
        println!("{}", "Entry updated".green().bold());
        println!();
        println!("  {} {}", "ID:".cyan(), self.id);
        println!("  {} {}", "Type:".cyan(), self.entry_type);
        println!("  {} {}", "Version:".cyan(), self.version);
        println!();
        for (name, value) in &self.fields {
            println!("  {:<12} {}", format!("{}:", name).yellow(), value);
        }
    }
}

/// Execute the set command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: SetArgs) -> Result<()> {
    let url = format!(
        "{}/libraries/{}/entries/{}/fields/{}",
        base_url, args.library_id, args.entry_id, args.field
    );

    let request = client
        .put(&url)
        .header(IF_MATCH, if_match(args.version))
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(args.value.unwrap_or_default());
    let entry: UpdatedEntry = make_request(request).await?;
    output(&entry, human)
}
