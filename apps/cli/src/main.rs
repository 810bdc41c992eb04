//! diagramlens CLI: render live diagrams into saved host pages.
//!
//! Loads a page, runs the transformation pipeline the way a browser session
//! would, and prints the augmented HTML.

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
