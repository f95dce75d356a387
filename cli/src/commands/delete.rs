//! DELETE command - Remove an entry from a library.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::header::IF_MATCH;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, if_match, output, send_empty};

/// Arguments for the delete command.
#[derive(Args)]
pub struct DeleteArgs {
    /// Library containing the entry
    pub library_id: String,

    /// Entry key to delete
    pub entry_id: String,

    /// Version the deletion is based on (see `show --human`)
    #[arg(short, long)]
    pub version: u64,

    /// Skip confirmation prompt (for non-interactive use)
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Outcome of a deletion.
#[derive(Debug, Deserialize, Serialize)]
pub struct Deleted {
    pub id: String,
    pub deleted: bool,
}

impl HumanReadable for Deleted {
    fn print_human(&self) {
        if self.deleted {
            println!("{}", "Entry deleted successfully!".green().bold());
        } else {
            println!("{}", "Entry kept.".yellow());
        }
        println!();
        println!("  {} {}", "ID:".cyan(), self.id);
    }
}

/// Execute the delete command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, args: DeleteArgs) -> Result<()> {
    // Confirmation prompt for interactive use
    if human && !args.yes {
        eprint!(
            "{} Are you sure you want to delete entry {} from {}? [y/N] ",
            "Warning:".yellow().bold(),
            args.entry_id,
            args.library_id
        );

        use std::io::Write;
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Aborted.");
            return output(
                &Deleted {
                    id: args.entry_id,
                    deleted: false,
                },
                human,
            );
        }
    }

    let url = format!(
        "{}/libraries/{}/entries/{}",
        base_url, args.library_id, args.entry_id
    );
    send_empty(client.delete(&url).header(IF_MATCH, if_match(args.version))).await?;

    output(
        &Deleted {
            id: args.entry_id,
            deleted: true,
        },
        human,
    )
}
