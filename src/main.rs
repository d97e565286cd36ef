mod cli;
mod drives;
mod engine;
mod model;
mod orchestrator;
mod registry;
mod session;
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args).await
}
