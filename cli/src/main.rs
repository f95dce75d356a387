//! Command-line client for a refshelf server.
//!
//! This CLI tool provides commands for the library API:
//! - libraries: List served libraries
//! - reload: Re-read a library from its file
//! - entries: List and filter entries
//! - show: Print one entry in any format
//! - cite: Render citations in a style
//! - add: Create an entry from a document
//! - set: Change a single field
//! - delete: Remove an entry
//!
//! Configuration via environment:
//! - REFSHELF_URL: Base URL of the server (default: http://127.0.0.1:23119)

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, cite::CiteArgs, delete::DeleteArgs, entries::EntriesArgs,
    libraries::LibrariesArgs, reload::ReloadArgs, set::SetArgs, show::ShowArgs,
};

/// refshelf CLI
///
/// Read and edit bibliographic libraries served by refshelf-server. Prints
/// JSON by default; --human switches to formatted output.
#[derive(Parser)]
#[command(name = "refshelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// refshelf server URL
    #[arg(
        long,
        env = "REFSHELF_URL",
        default_value = "http://127.0.0.1:23119",
        global = true
    )]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List libraries, or show one
    Libraries(LibrariesArgs),

    /// Reload a library from its source file
    Reload(ReloadArgs),

    /// List entries of a library
    Entries(EntriesArgs),

    /// Show one entry
    Show(ShowArgs),

    /// Render citations
    Cite(CiteArgs),

    /// Add an entry
    Add(AddArgs),

    /// Set or clear a field of an entry
    Set(SetArgs),

    /// Delete an entry
    Delete(DeleteArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    let result = match cli.command {
        Commands::Libraries(args) => commands::libraries::execute(&client, url, cli.human, args).await,
        Commands::Reload(args) => commands::reload::execute(&client, url, cli.human, args).await,
        Commands::Entries(args) => commands::entries::execute(&client, url, cli.human, args).await,
        Commands::Show(args) => commands::show::execute(&client, url, cli.human, args).await,
        Commands::Cite(args) => commands::cite::execute(&client, url, cli.human, args).await,
        Commands::Add(args) => commands::add::execute(&client, url, cli.human, args).await,
        Commands::Set(args) => commands::set::execute(&client, url, cli.human, args).await,
        Commands::Delete(args) => commands::delete::execute(&client, url, cli.human, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
