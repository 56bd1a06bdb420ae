//! Configuration management command
//!
//! Provides the CLI interface to view and edit the config file.

use crate::config::{self, AppConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let cfg = config::load()?;
    let path = config::config_file_path()?;

    println!("{}", "Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), path.display());

    println!("{}", "[paths]".yellow());
    println!(
        "  {} = {}",
        "source_directory".cyan(),
        display_value(&cfg.source_directory)
    );
    println!(
        "  {} = {}",
        "destination_directory".cyan(),
        display_value(&cfg.destination_directory)
    );

    println!("\n{}", "[behavior]".yellow());
    println!("  {} = {}", "mirror_deletions".cyan(), cfg.mirror_deletions);
    println!("  {} = {}", "use_polling".cyan(), cfg.use_polling);
    println!("  {} = {}", "process_renames".cyan(), cfg.process_renames);

    println!("\n{}", "[timing]".yellow());
    println!("  {} = {}", "debounce_seconds".cyan(), cfg.debounce_seconds);
    println!(
        "  {} = {}",
        "max_latency_seconds".cyan(),
        cfg.max_latency_seconds
    );
    println!(
        "  {} = {} {}",
        "sync_rate_seconds".cyan(),
        cfg.sync_rate_seconds,
        if cfg.sync_rate_seconds == 0.0 {
            "(periodic sync disabled)".dimmed().to_string()
        } else {
            String::new()
        }
    );

    println!("\n{}", "[exclusions]".yellow());
    println!(
        "  {} = {}",
        "exclude_files".cyan(),
        display_value(&cfg.exclude_files.join(";"))
    );
    println!(
        "  {} = {}",
        "exclude_dirs".cyan(),
        display_value(&cfg.exclude_dirs.join(";"))
    );

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let cfg = config::load()?;

    let value = match key {
        "source_directory" => cfg.source_directory,
        "destination_directory" => cfg.destination_directory,
        "mirror_deletions" => cfg.mirror_deletions.to_string(),
        "use_polling" => cfg.use_polling.to_string(),
        "process_renames" => cfg.process_renames.to_string(),
        "debounce_seconds" => cfg.debounce_seconds.to_string(),
        "max_latency_seconds" => cfg.max_latency_seconds.to_string(),
        "sync_rate_seconds" => cfg.sync_rate_seconds.to_string(),
        "exclude_files" => cfg.exclude_files.join(";"),
        "exclude_dirs" => cfg.exclude_dirs.join(";"),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'shsync config list' to see available keys.",
            key
        ),
    };

    println!("{}", value);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = config::load()?;
    apply(&mut cfg, key, value)?;
    config::save(&cfg)?;

    println!("{} = {}", key.cyan(), value);
    Ok(())
}

fn apply(cfg: &mut AppConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "source_directory" => cfg.source_directory = value.to_string(),
        "destination_directory" => cfg.destination_directory = value.to_string(),
        "mirror_deletions" => cfg.mirror_deletions = parse_bool(key, value)?,
        "use_polling" => cfg.use_polling = parse_bool(key, value)?,
        "process_renames" => cfg.process_renames = parse_bool(key, value)?,
        "debounce_seconds" => cfg.debounce_seconds = parse_seconds(key, value)?,
        "max_latency_seconds" => cfg.max_latency_seconds = parse_seconds(key, value)?,
        "sync_rate_seconds" => cfg.sync_rate_seconds = parse_seconds(key, value)?,
        "exclude_files" => cfg.exclude_files = split_list(value),
        "exclude_dirs" => cfg.exclude_dirs = split_list(value),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'shsync config list' to see available keys.",
            key
        ),
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .with_context(|| format!("{key} expects true or false, got '{value}'"))
}

fn parse_seconds(key: &str, value: &str) -> Result<f64> {
    let seconds: f64 = value
        .parse()
        .with_context(|| format!("{key} expects a number of seconds, got '{value}'"))?;
    if seconds < 0.0 {
        anyhow::bail!("{key} must be non-negative");
    }
    Ok(seconds)
}

/// Split a `;`-separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

fn display_value(value: &str) -> String {
    if value.is_empty() {
        "(unset)".dimmed().to_string()
    } else {
        value.to_string()
    }
}
