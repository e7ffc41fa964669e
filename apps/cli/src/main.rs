//! Sheetwright CLI: batch content generation over spreadsheet rows.
//!
//! Reads task inputs from worksheet rows, generates copy with a language
//! model and writes each result back into its row.

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
