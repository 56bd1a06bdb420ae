//! Long-path handling
//!
//! Classic Windows APIs cap absolute paths at ~260 characters; the
//! `\\?\` extended-length prefix lifts the limit. Every operation that
//! touches the filesystem with a caller-supplied path routes it through
//! [`to_long_path`] first. On non-Windows platforms paths pass through
//! unchanged.

use std::path::{Path, PathBuf};

/// Prefix an absolute Windows path with `\\?\` so it survives the
/// legacy length limit. Relative and already-prefixed paths are
/// returned as-is.
#[cfg(windows)]
pub fn to_long_path(path: &Path) -> PathBuf {
    let raw = path.as_os_str().to_string_lossy();

    if !path.is_absolute() || raw.starts_with(r"\\?\") || raw.starts_with(r"\\") {
        return path.to_path_buf();
    }

    // The extended-length form rejects forward slashes
    let normalized = raw.replace('/', r"\");
    PathBuf::from(format!(r"\\?\{normalized}"))
}

#[cfg(not(windows))]
pub fn to_long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}
