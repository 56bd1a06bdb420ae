//! Extension correction with metadata-preserving atomic renames
//!
//! Compares a file's content-detected format against its extension and,
//! when they disagree, renames the file in place:
//! - Atomic rename (same directory, same volume)
//! - Access/modification timestamps captured before and reapplied after
//! - Bounded exponential backoff on transient lock errors
//! - Collision-safe `_1`, `_2`, ... suffixing when the target is taken

use crate::detect::{self, ImageFormat};
use crate::paths::to_long_path;
use filetime::FileTime;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Total rename attempts when a transient lock error occurs
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay between rename attempts (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Outcome of comparing a file's detected format against its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameDecision {
    pub should_rename: bool,
    /// Corrected extension (without dot), set only when a rename is due
    pub target_extension: Option<&'static str>,
}

impl RenameDecision {
    const KEEP: Self = Self {
        should_rename: false,
        target_extension: None,
    };

    const fn to(ext: &'static str) -> Self {
        Self {
            should_rename: true,
            target_extension: Some(ext),
        }
    }
}

/// Decide whether a file needs its extension corrected.
///
/// Reads the file's header for detection; the decision logic itself is
/// [`decide_for`], a pure function over (extension, format).
pub fn decide(path: &Path) -> RenameDecision {
    let format = detect::detect_file(path);
    let ext = path.extension().map(|e| e.to_string_lossy());
    decide_for(ext.as_deref(), format)
}

/// Pure decision core: what extension should a file of `format` bearing
/// `current_ext` end up with?
///
/// - CR3 content under `.jpg`/`.jpeg` moves to `.cr3`
/// - JPEG content under `.cr3` moves to `.jpg`
/// - JPEG content under any spelling of `.jpg`/`.jpeg` other than the
///   exact lowercase `.jpg` is case-normalized to `.jpg`
/// - Unknown content never renames
pub fn decide_for(current_ext: Option<&str>, format: ImageFormat) -> RenameDecision {
    let Some(ext) = current_ext else {
        return RenameDecision::KEEP;
    };
    let lower = ext.to_ascii_lowercase();
    let is_jpegish = lower == "jpg" || lower == "jpeg";

    match format {
        ImageFormat::Cr3 if is_jpegish => RenameDecision::to("cr3"),
        ImageFormat::Jpeg if lower == "cr3" => RenameDecision::to("jpg"),
        ImageFormat::Jpeg if is_jpegish && ext != "jpg" => RenameDecision::to("jpg"),
        _ => RenameDecision::KEEP,
    }
}

/// Detect, decide, and rename a single file.
///
/// Returns the new path when a rename happened. Missing files, files
/// already correctly named, and rename failures all return `None`;
/// failures are logged, never raised. A file left under its original
/// name is picked up again by a later pass.
pub fn process(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        debug!("File not found, skipping: {}", path.display());
        return None;
    }

    let decision = decide(path);
    let target_ext = decision.target_extension?;

    let mut target = path.with_extension(target_ext);

    // Divert to a suffixed name only when a *different* file holds the
    // target; a case-only rename on a case-insensitive filesystem sees
    // its own target "exist".
    if target.exists() && !same_file::is_same_file(path, &target).unwrap_or(false) {
        warn!("Target exists, finding unique name: {}", target.display());
        target = unique_path(&target);
    }

    match rename_with_metadata(path, &target) {
        Ok(()) => {
            info!("Renamed: {} -> {}", display_name(path), display_name(&target));
            Some(target)
        }
        Err(e) => {
            error!("Failed to rename {}: {}", path.display(), e);
            None
        }
    }
}

/// First available `<stem>_N<ext>` sibling of `target`, with N counting
/// up from 1. Bounded only by filesystem capacity.
pub fn unique_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = target.parent().unwrap_or_else(|| Path::new(""));

    let mut counter: u64 = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Atomically rename `old` to `new`, preserving timestamps.
///
/// Access and modification times are captured before the move and
/// reapplied to the new path afterwards (the pre-move path is gone once
/// the atomic rename lands, so the times are always set directly on the
/// destination). Transient lock errors retry with exponential backoff
/// (base 0.5s, doubling); any other error aborts immediately.
pub fn rename_with_metadata(old: &Path, new: &Path) -> io::Result<()> {
    let old_long = to_long_path(old);
    let new_long = to_long_path(new);

    let mut attempt: u32 = 0;
    loop {
        // Capture timestamps before the move
        let meta = std::fs::metadata(&old_long)?;
        let atime = FileTime::from_last_access_time(&meta);
        let mtime = FileTime::from_last_modification_time(&meta);

        match std::fs::rename(&old_long, &new_long) {
            Ok(()) => {
                if let Err(e) = filetime::set_file_times(&new_long, atime, mtime) {
                    warn!(
                        "Could not restore timestamps on {}: {}",
                        new.display(),
                        e
                    );
                }
                return Ok(());
            }
            Err(e) if is_transient_lock(&e) && attempt + 1 < MAX_ATTEMPTS => {
                attempt += 1;
                warn!(
                    "File locked, retry {}/{}: {}",
                    attempt,
                    MAX_ATTEMPTS,
                    display_name(old)
                );
                std::thread::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Errors worth retrying: the file is momentarily held open by another
/// process (camera tether software, thumbnailers, antivirus).
fn is_transient_lock(e: &io::Error) -> bool {
    if e.kind() == ErrorKind::PermissionDenied {
        return true;
    }

    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    if matches!(e.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }

    false
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
