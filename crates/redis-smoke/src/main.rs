//! Redis smoke tests for Cloud Foundry
//!
//! This is the main entry point for the `redis-smoke` command-line interface.

mod cli;
mod commands;
mod output;
mod reporter;
mod suite;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Run command
    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.config.as_deref()).await,
        Commands::Ha(args) => commands::ha::run(args, cli.config.as_deref()).await,
        Commands::Config(cmd) => commands::config::run(cmd, cli.config.as_deref()).await,
        Commands::Doctor => commands::doctor::run().await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Step progress is logged at info
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
