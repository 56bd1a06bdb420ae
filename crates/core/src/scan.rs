//! One-shot corrective sweep over an existing tree
//!
//! Applies the rename engine to every watched image file under a root,
//! independent of live watching. Useful for trees that accumulated
//! misnamed files before watching started.

use crate::rename;
use anyhow::{bail, Result};
use std::path::Path;
use tracing::{error, info};
use walkdir::WalkDir;

/// Counters for a batch sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Candidate files examined
    pub processed: u64,
    /// Files successfully renamed
    pub renamed: u64,
    /// Files that needed a rename but did not end up renamed
    pub failed: u64,
}

/// Sweep `root`, renaming misnamed image files as they are found.
///
/// Per-file failures land in the `failed` counter and never abort the
/// sweep; only a missing root is a hard error.
pub fn scan(root: &Path, recursive: bool) -> Result<ScanStats> {
    if !root.exists() {
        bail!("Directory not found: {}", root.display());
    }

    let mut stats = ScanStats::default();

    let mut walker = WalkDir::new(root).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Scan error: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !crate::is_watched_extension(path) {
            continue;
        }

        stats.processed += 1;

        match rename::process(path) {
            Some(_) => stats.renamed += 1,
            None => {
                // process() already logged any failure; count it only
                // when a rename was actually due and did not happen
                if rename::decide(path).should_rename {
                    stats.failed += 1;
                }
            }
        }
    }

    info!(
        "Batch complete: {} processed, {} renamed, {} failed",
        stats.processed, stats.renamed, stats.failed
    );

    Ok(stats)
}
