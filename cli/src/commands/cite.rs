//! CITE command - Render citations for one or more entries.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, make_request, output};

/// Arguments for the cite command.
#[derive(Args)]
pub struct CiteArgs {
    /// Library containing the entries
    pub library_id: String,

    /// Entry keys, cited in this order
    #[arg(required = true)]
    pub entry_ids: Vec<String>,

    /// Citation style (defaults to the server's configured style)
    #[arg(short, long)]
    pub style: Option<String>,

    /// bibliography or inline
    #[arg(short, long, default_value = "bibliography")]
    pub mode: String,
}

/// Rendered citation envelope.
#[derive(Debug, Deserialize, Serialize)]
pub struct Citation {
    pub style: String,
    pub mode: String,
    pub text: String,
    #[serde(default)]
    pub items: Vec<CitationItem>,
    #[serde(default)]
    pub failures: Vec<RenderFailure>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CitationItem {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFailure {
    pub entry_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl HumanReadable for Citation {
    fn print_human(&self) {
        println!(
            "{} {}",
            self.style.green().bold(),
            format!("({})", self.mode).dimmed()
        );
        println!("{}", "-".repeat(60));
        println!("{}", self.text);

        if !self.failures.is_empty() {
            println!();
            println!("{}", "Not rendered:".red().bold());
            for failure in &self.failures {
                let field = failure
                    .field
                    .as_ref()
                    .map(|f| format!("[{}] ", f))
                    .unwrap_or_default();
                println!("  - {} {}{}", failure.entry_id.yellow(), field, failure.message);
            }
        }
    }
}

/// Execute the cite command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: CiteArgs) -> Result<()> {
    let url = format!("{}/libraries/{}/citations", base_url, args.library_id);

    let mut query = vec![
        ("ids", args.entry_ids.join(",")),
        ("mode", args.mode),
        ("format", "citation".to_string()),
    ];
    if let Some(style) = args.style {
        query.push(("style", style));
    }

    let request = client
        .get(&url)
        .query(&query)
        .header(ACCEPT, "application/vnd.refshelf.citation+json");
    let citation: Citation = make_request(request).await?;
    output(&citation, human)
}
