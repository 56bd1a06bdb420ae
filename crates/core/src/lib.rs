//! Content detection and rename machinery for shuttersync
//!
//! This crate provides the filesystem-level building blocks:
//! - Magic-byte image format detection (content, not extension)
//! - Atomic, metadata-preserving extension correction
//! - Batch sweeps over existing trees

pub mod detect;
pub mod paths;
pub mod rename;
pub mod scan;

pub use detect::ImageFormat;
pub use rename::RenameDecision;
pub use scan::ScanStats;

use std::path::Path;

/// File extensions (lowercase, without dot) eligible for content-based
/// rename correction.
pub const WATCHED_EXTENSIONS: &[&str] = &["cr3", "jpg", "jpeg"];

/// Check whether a path bears one of the watched image extensions.
///
/// Comparison is case-insensitive, so `.CR3` and `.Jpg` qualify.
pub fn is_watched_extension(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            WATCHED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
