//! Reconcile executor: one-way directory sync via rsync
//!
//! Builds the rsync invocation from configuration, runs it as a black
//! box subprocess, and distills its `--stats` output into a structured
//! [`SyncOutcome`]. The bulk-copy algorithm itself stays external; this
//! crate only decides how to call it and how to read its answer.

use anyhow::{Context, Result};
use shuttersync_core::paths::to_long_path;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{error, info};

/// Result record for one reconcile run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub exit_code: i32,
    pub success: bool,
    pub files_transferred: u64,
    pub files_failed: u64,
    pub duration_seconds: f64,
    /// Combined stdout/stderr, kept for diagnostics
    pub output: String,
}

impl SyncOutcome {
    fn failure(exit_code: i32, duration_seconds: f64, output: String) -> Self {
        Self {
            exit_code,
            success: false,
            files_transferred: 0,
            files_failed: 0,
            duration_seconds,
            output,
        }
    }
}

/// rsync-based one-way sync engine
pub struct SyncEngine {
    source: PathBuf,
    destination: PathBuf,
    mirror: bool,
    exclude_files: Vec<String>,
    exclude_dirs: Vec<String>,
    program: String,
}

impl SyncEngine {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mirror: false,
            exclude_files: Vec::new(),
            exclude_dirs: Vec::new(),
            program: "rsync".to_string(),
        }
    }

    /// Delete destination files absent from the source
    pub fn mirror(mut self, enabled: bool) -> Self {
        self.mirror = enabled;
        self
    }

    /// File patterns to exclude (e.g. `*.tmp`)
    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.exclude_files = patterns;
        self
    }

    /// Directory names to exclude (e.g. `cache`)
    pub fn exclude_dirs(mut self, names: Vec<String>) -> Self {
        self.exclude_dirs = names;
        self
    }

    /// Override the sync binary (used by tests and wrapper scripts)
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Build the rsync argument list.
    pub fn build_args(&self, dry_run: bool) -> Vec<String> {
        // -a: recurse and preserve times, permissions, ownership
        let mut args = vec!["-a".to_string(), "--stats".to_string()];

        if self.mirror {
            args.push("--delete".to_string());
        }
        if dry_run {
            args.push("--dry-run".to_string());
        }
        for pattern in &self.exclude_files {
            args.push(format!("--exclude={pattern}"));
        }
        for name in &self.exclude_dirs {
            args.push(format!("--exclude={name}/"));
        }

        // Trailing slash: sync the source's contents, not the directory
        // itself, into the destination
        let mut source = to_long_path(&self.source).to_string_lossy().into_owned();
        if !source.ends_with('/') {
            source.push('/');
        }
        args.push(source);
        args.push(
            to_long_path(&self.destination)
                .to_string_lossy()
                .into_owned(),
        );

        args
    }

    /// Run the sync and report a structured outcome.
    ///
    /// A failing or missing rsync binary yields a failure outcome, never
    /// a panic; the caller decides whether and when to try again.
    pub fn sync(&self, dry_run: bool) -> SyncOutcome {
        info!(
            "Starting sync: {} -> {}",
            self.source.display(),
            self.destination.display()
        );
        if dry_run {
            info!("Dry run: no files will be copied");
        }

        let args = self.build_args(dry_run);
        let started = Instant::now();

        let output = match Command::new(&self.program).args(&args).output() {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to launch {}: {}", self.program, e);
                return SyncOutcome::failure(
                    -1,
                    started.elapsed().as_secs_f64(),
                    e.to_string(),
                );
            }
        };

        let duration_seconds = started.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let exit_code = output.status.code().unwrap_or(-1);
        // 0 is a clean run; 23/24 are partial transfers (some files
        // vanished mid-run or could not be read), still useful work
        let success = matches!(exit_code, 0 | 23 | 24);

        let files_transferred = parse_stat(&stdout, "Number of regular files transferred:")
            .or_else(|| parse_stat(&stdout, "Number of files transferred:"))
            .unwrap_or(0);
        let files_failed = stderr
            .lines()
            .filter(|line| line.starts_with("rsync:") && line.contains("failed"))
            .count() as u64;

        if success {
            info!(
                "Sync completed: {} files transferred, {} failed, {:.1}s, exit code {}",
                files_transferred, files_failed, duration_seconds, exit_code
            );
        } else {
            error!(
                "Sync failed: exit code {}, {} transferred, {} failed",
                exit_code, files_transferred, files_failed
            );
        }

        SyncOutcome {
            exit_code,
            success,
            files_transferred,
            files_failed,
            duration_seconds,
            output: format!("{stdout}{stderr}"),
        }
    }

    /// Verify the source exists and the destination can be created.
    pub fn test_connection(&self) -> Result<()> {
        if !self.source.exists() {
            anyhow::bail!("Source directory not found: {}", self.source.display());
        }
        if !self.source.is_dir() {
            anyhow::bail!("Source is not a directory: {}", self.source.display());
        }

        std::fs::create_dir_all(&self.destination).with_context(|| {
            format!(
                "Cannot create destination directory: {}",
                self.destination.display()
            )
        })?;
        if !self.destination.is_dir() {
            anyhow::bail!(
                "Destination is not a directory: {}",
                self.destination.display()
            );
        }

        Ok(())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Pull a numeric value out of an `rsync --stats` line such as
/// `Number of regular files transferred: 1,234`
fn parse_stat(output: &str, label: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(label)?;
        rest.trim().replace(',', "").parse().ok()
    })
}
