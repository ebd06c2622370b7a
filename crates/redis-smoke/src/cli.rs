//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Redis smoke tests for Cloud Foundry
#[derive(Parser, Debug)]
#[command(name = "redis-smoke")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the JSON config file
    #[arg(short, long, global = true, env = "CONFIG_PATH")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the service lifecycle suite against every configured plan
    Run(RunArgs),

    /// Run the failover suite against HA-enabled plans
    Ha(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Check that the tools the suites need are installed
    Doctor,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Only run these plans (repeatable)
    #[arg(short, long = "plan")]
    pub plans: Vec<String>,

    /// Keep the test org after the run
    #[arg(long)]
    pub keep_org: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration
    Validate,

    /// Show the loaded configuration with secrets redacted
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
