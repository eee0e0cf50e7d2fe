//! tldr CLI: simplified, community-driven man pages in the terminal.
//!
//! Keeps a local cache of tldr pages, refreshed from the upstream archive,
//! and renders a requested page with semantic coloring.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
