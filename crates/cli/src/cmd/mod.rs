//! CLI subcommand implementations

pub mod config;
pub mod scan;
pub mod sync;
pub mod watch;

use crate::config::AppConfig;
use anyhow::Result;
use shuttersync_reconcile::SyncEngine;
use std::path::{Path, PathBuf};

/// Resolve the directory to watch/sync from: a command-line override
/// wins over the configured source.
pub(crate) fn resolve_source(cfg: &AppConfig, overridden: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = overridden {
        return Ok(path);
    }
    if cfg.source_directory.is_empty() {
        anyhow::bail!(
            "No source directory configured. Set one with 'shsync config set source_directory <path>'"
        );
    }
    Ok(PathBuf::from(&cfg.source_directory))
}

/// Build the reconcile engine from configuration.
pub(crate) fn build_engine(cfg: &AppConfig, source: &Path) -> Result<SyncEngine> {
    if cfg.destination_directory.is_empty() {
        anyhow::bail!(
            "No destination directory configured. Set one with 'shsync config set destination_directory <path>'"
        );
    }

    Ok(SyncEngine::new(source, &cfg.destination_directory)
        .mirror(cfg.mirror_deletions)
        .exclude_files(cfg.exclude_files.clone())
        .exclude_dirs(cfg.exclude_dirs.clone()))
}
