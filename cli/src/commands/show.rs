//! SHOW command - Print one entry in a chosen format.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::fetch_text;

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Library containing the entry
    pub library_id: String,

    /// Entry key
    pub entry_id: String,

    /// Representation to request (bibtex, csl-json, citation, citation-text)
    #[arg(short, long, default_value = "bibtex")]
    pub format: String,

    /// Print a single field's value instead of the whole entry
    #[arg(long)]
    pub field: Option<String>,
}

/// Execute the show command.
///
/// The body is printed as received; `--human` adds a header with the
/// entry version, which later writes need.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: ShowArgs) -> Result<()> {
    let entry_url = format!(
        "{}/libraries/{}/entries/{}",
        base_url, args.library_id, args.entry_id
    );
    let request = match &args.field {
        Some(field) => client.get(format!("{}/fields/{}", entry_url, field)),
        None => client.get(&entry_url).query(&[("format", args.format.as_str())]),
    };
    let response = fetch_text(request).await?;

    if human {
        println!("{} {}", "Entry".green().bold(), args.entry_id.bold());
        if let Some(version) = &response.version {
            println!("  {} {}", "Version:".cyan(), version);
        }
        if let Some(content_type) = &response.content_type {
            println!("  {} {}", "Content-Type:".cyan(), content_type);
        }
        println!("{}", "-".repeat(60));
    }

    print!("{}", response.body);
    if !response.body.ends_with('\n') {
        println!();
    }
    Ok(())
}
