//! Mermaid Studio CLI - render, check and repair Mermaid.js diagrams

mod cli;
mod colorizer;
mod exec;
mod mmdc;

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli_args = cli::Cli::parse();

    // Logging is initialized inside `run` from the CLI flags and environment
    let app = cli::StudioApp::new();

    if let Err(e) = app.run(cli_args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
