//! Convoy CLI - Deploy dependent AI agent services from declarative manifests

#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;

use convoy_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
