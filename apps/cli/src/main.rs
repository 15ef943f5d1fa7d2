//! postfeed CLI: keeps a summarized, searchable archive of an author's posts.
//!
//! Polls the author's feed, summarizes and stores each new post, and keeps
//! the retrieval index in step with the stored corpus.

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
