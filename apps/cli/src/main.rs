//! LeadScout CLI: find social profile URLs for a CSV of sales leads.
//!
//! Looks each lead up through a web search provider, writes the profile
//! URL and a status back into the file, and resumes where a previous run
//! stopped.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
