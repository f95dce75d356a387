//! LIBRARIES command - List served libraries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_request, output, truncate};

/// Arguments for the libraries command.
#[derive(Args)]
pub struct LibrariesArgs {
    /// Show a single library instead of all
    pub library_id: Option<String>,
}

/// Library metadata as returned by the server.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub id: String,
    pub name: String,
    pub encoding: String,
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub entry_count: usize,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
}

impl LibrarySummary {
    pub(crate) fn print_details(&self) {
        println!("  {} {}", "ID:".cyan(), self.id);
        println!("  {} {}", "Name:".cyan(), self.name);
        if let Some(source) = &self.source {
            println!("  {} {}", "Source:".cyan(), source);
        }
        println!("  {} {}", "Entries:".cyan(), self.entry_count);
        println!("  {} {}", "Encoding:".cyan(), self.encoding);
        println!("  {} {}", "Generation:".cyan(), self.generation);
        println!("  {} {}", "Loaded:".cyan(), format_timestamp(&self.loaded_at));
    }
}

/// Serialized as a bare array, matching the server.
#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LibraryList(pub Vec<LibrarySummary>);

impl HumanReadable for LibraryList {
    fn print_human(&self) {
        println!("{}", "Libraries".green().bold());
        println!("{}", "=".repeat(80));
        println!();

        if self.0.is_empty() {
            println!("  {}", "(No libraries loaded)".dimmed());
            return;
        }

        for library in &self.0 {
            println!(
                "  {}  {} {}",
                truncate(&library.id, 16).yellow(),
                library.name.bold(),
                format!("({} entries)", library.entry_count).dimmed()
            );
        }
    }
}

impl HumanReadable for LibrarySummary {
    fn print_human(&self) {
        println!("{}", "Library".green().bold());
        println!("{}", "=".repeat(60));
        println!();
        self.print_details();
    }
}

/// Execute the libraries command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: LibrariesArgs) -> Result<()> {
    match args.library_id {
        Some(id) => {
            let url = format!("{}/libraries/{}", base_url, id);
            let library: LibrarySummary = make_request(client.get(&url)).await?;
            output(&library, human)
        }
        None => {
            let url = format!("{}/libraries", base_url);
            let libraries: LibraryList = make_request(client.get(&url)).await?;
            output(&libraries, human)
        }
    }
}
