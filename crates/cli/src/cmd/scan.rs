//! Batch extension-correction sweep

use crate::config;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;

pub async fn run(path: Option<PathBuf>, no_recursive: bool) -> Result<()> {
    let cfg = config::load()?;
    let root = super::resolve_source(&cfg, path)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
    );
    spinner.set_message(format!("Scanning {}", root.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let recursive = !no_recursive;
    let stats = tokio::task::spawn_blocking({
        let root = root.clone();
        move || shuttersync_core::scan::scan(&root, recursive)
    })
    .await
    .context("Scan task panicked")??;

    spinner.finish_and_clear();

    println!("{} {}", "Scan complete:".bold(), root.display());
    println!("  Processed: {}", stats.processed);
    println!("  Renamed:   {}", stats.renamed.green());
    if stats.failed > 0 {
        println!("  Failed:    {}", stats.failed.red());
        anyhow::bail!("{} files could not be renamed", stats.failed);
    }
    println!("  Failed:    0");
    Ok(())
}
