//! Logging setup
//!
//! Every command logs to the console; watch sessions additionally write
//! daily-rolled files under the platform data directory so long-running
//! sessions leave a trail.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Initialize the tracing subscriber.
///
/// Returns a guard that must stay alive for the process lifetime when
/// file logging is on; dropping it early loses buffered log lines.
pub fn init(with_file: bool) -> Result<Option<WorkerGuard>> {
    if !with_file {
        tracing_subscriber::fmt::init();
        return Ok(None);
    }

    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "shuttersync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(file_writer.and(std::io::stdout))
        .init();

    tracing::info!("Logging to {}", log_dir.display());
    Ok(Some(guard))
}

fn log_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("Could not determine data directory")?;
    Ok(base.join("shuttersync").join("logs"))
}
