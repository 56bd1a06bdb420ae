//! Content-based image format detection
//!
//! Classifies files by their leading bytes rather than their extension.
//! A Canon RAW file saved as `.jpg` still classifies as CR3, and that
//! asymmetry is what drives the rename engine.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Number of leading bytes inspected for classification
const HEADER_LEN: usize = 32;

/// ISO-BMFF brand marker for the Canon RAW 3 container, at byte offset 4
const CR3_BRAND: &[u8] = b"ftypcrx ";

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Container format detected from a file's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Canon RAW 3 (ISO-BMFF container)
    Cr3,
    /// JPEG, including JFIF/EXIF variants
    Jpeg,
    /// Anything else, including unreadable or truncated files
    Unknown,
}

impl ImageFormat {
    /// Canonical lowercase extension for the format, if it has one
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Cr3 => Some("cr3"),
            ImageFormat::Jpeg => Some("jpg"),
            ImageFormat::Unknown => None,
        }
    }
}

/// Classify a header buffer into a known container format.
///
/// The CR3 check keys off the ISO-BMFF brand at offset 4 only. Looser
/// substring scans (e.g. "Canon" anywhere in the header) misclassify
/// JPEGs whose EXIF metadata names the vendor.
pub fn detect_header(header: &[u8]) -> ImageFormat {
    if header.len() < 12 {
        return ImageFormat::Unknown;
    }

    if &header[4..12] == CR3_BRAND {
        return ImageFormat::Cr3;
    }

    if header[0..3] == JPEG_SOI {
        return ImageFormat::Jpeg;
    }

    // JFIF/EXIF markers anywhere in the window also mean JPEG
    if contains_marker(header, b"JFIF") || contains_marker(header, b"EXIF") {
        return ImageFormat::Jpeg;
    }

    ImageFormat::Unknown
}

/// Detect the format of a file on disk.
///
/// Unreadable or missing files classify as `Unknown` with a warning;
/// detection is advisory and never a hard error.
pub fn detect_file(path: &Path) -> ImageFormat {
    let mut header = [0u8; HEADER_LEN];
    let read = match read_header(path, &mut header) {
        Ok(n) => n,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return ImageFormat::Unknown;
        }
    };

    detect_header(&header[..read])
}

fn contains_marker(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Fill `buf` from the start of the file, short files permitted
fn read_header(path: &Path, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut file = File::open(path)?;
    let mut total = 0;

    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }

    Ok(total)
}

/// 32-byte header with the CR3 brand at offset 4. Test fixture shared
/// with the rename and scan tests.
#[cfg(test)]
pub(crate) fn cr3_header() -> Vec<u8> {
    let mut header = vec![0u8; HEADER_LEN];
    header[..4].copy_from_slice(&[0x00, 0x00, 0x00, 0x18]);
    header[4..12].copy_from_slice(CR3_BRAND);
    header
}

/// 32-byte header starting with the JPEG SOI marker
#[cfg(test)]
pub(crate) fn jpeg_header() -> Vec<u8> {
    let mut header = vec![0u8; HEADER_LEN];
    header[..3].copy_from_slice(&JPEG_SOI);
    header[3] = 0xE0;
    header[6..10].copy_from_slice(b"JFIF");
    header
}
