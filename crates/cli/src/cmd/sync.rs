//! One-shot sync

use crate::config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub async fn run(dry_run: bool) -> Result<()> {
    let cfg = config::load()?;
    let source = super::resolve_source(&cfg, None)?;

    let engine = super::build_engine(&cfg, &source)?;
    engine
        .test_connection()
        .context("Source/destination check failed")?;

    let outcome = tokio::task::spawn_blocking(move || engine.sync(dry_run))
        .await
        .context("Sync task panicked")?;

    if outcome.success {
        let label = if dry_run {
            "Dry run completed:"
        } else {
            "Sync completed:"
        };
        println!(
            "{} {} files transferred in {:.1}s",
            label.green().bold(),
            outcome.files_transferred,
            outcome.duration_seconds
        );
        if outcome.files_failed > 0 {
            println!(
                "  {} {} files failed",
                "Warning:".yellow(),
                outcome.files_failed
            );
        }
        Ok(())
    } else {
        // Show the tail of the tool output so the error is visible
        // without digging through log files
        for line in outcome.output.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
            eprintln!("  {}", line.dimmed());
        }
        anyhow::bail!("Sync failed with exit code {}", outcome.exit_code)
    }
}
