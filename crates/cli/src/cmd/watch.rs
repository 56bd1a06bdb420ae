//! Foreground watch loop

use crate::config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use shuttersync_watcher::{DirWatcher, SyncFn};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(source: Option<PathBuf>, polling: bool, no_rename: bool) -> Result<()> {
    let cfg = config::load()?;
    let source = super::resolve_source(&cfg, source)?;

    let engine = super::build_engine(&cfg, &source)?;
    engine
        .test_connection()
        .context("Source/destination check failed")?;

    let engine = Arc::new(engine);
    let sync_fn: SyncFn = {
        let engine = Arc::clone(&engine);
        Arc::new(move |trigger| {
            info!("Sync requested ({})", trigger);
            Ok(engine.sync(false))
        })
    };

    let mut watch_cfg = cfg.watch_config();
    if polling {
        watch_cfg.use_polling = true;
    }
    if no_rename {
        watch_cfg.process_renames = false;
    }

    let watcher = DirWatcher::new(&source, watch_cfg, sync_fn);
    watcher.start()?;

    println!(
        "{} {} {} {}",
        "Watching".green().bold(),
        source.display(),
        "->".dimmed(),
        engine.destination().display()
    );
    println!("  {}", "Press Ctrl-C to stop".dimmed());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    println!();

    watcher.stop().await;
    println!("{}", "Stopped".yellow());
    Ok(())
}
