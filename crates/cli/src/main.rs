//! Shuttersync CLI - shsync command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod logging;

/// Shuttersync - watch, fix, and mirror camera ingest directories
#[derive(Parser)]
#[command(name = "shsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the source directory and sync on activity
    Watch {
        /// Override the configured source directory
        #[arg(long)]
        source: Option<PathBuf>,

        /// Use the polling backend instead of native OS events
        #[arg(long)]
        polling: bool,

        /// Disable content-based extension correction
        #[arg(long)]
        no_rename: bool,
    },
    /// Run a one-shot sync now
    Sync {
        /// List what would be copied without copying anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Correct misnamed image files under a directory
    Scan {
        /// Directory to sweep (default: configured source)
        path: Option<PathBuf>,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,
    },
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Print a single configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Watch sessions log to the rolling file as well as the console
    let _log_guard = logging::init(matches!(cli.command, Commands::Watch { .. }))?;

    match cli.command {
        Commands::Watch {
            source,
            polling,
            no_rename,
        } => cmd::watch::run(source, polling, no_rename).await,
        Commands::Sync { dry_run } => cmd::sync::run(dry_run).await,
        Commands::Scan { path, no_recursive } => cmd::scan::run(path, no_recursive).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
        },
    }
}
