//! RELOAD command - Re-read a library from its file.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::libraries::LibrarySummary;
use super::{HumanReadable, make_request, output};

/// Arguments for the reload command.
#[derive(Args)]
pub struct ReloadArgs {
    /// Library to reload
    pub library_id: String,
}

#[derive(Serialize)]
#[serde(transparent)]
struct Reloaded(LibrarySummary);

impl HumanReadable for Reloaded {
    fn print_human(&self) {
        println!("{}", "Library reloaded".green().bold());
        println!();
        self.0.print_details();
    }
}

/// Execute the reload command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: ReloadArgs) -> Result<()> {
    let url = format!("{}/libraries/{}/reload", base_url, args.library_id);
    let library: LibrarySummary = make_request(client.post(&url)).await?;
    output(&Reloaded(library), human)
}
