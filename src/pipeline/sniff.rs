//! Image format detection from magic bytes.
//!
//! The backend does not reliably report the format it chose, and the file
//! extension is the only format hint a viewer gets, so the extension is
//! always derived from the payload itself.

use serde::{Deserialize, Serialize};
use std::fmt;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = b"\xff\xd8";
const GIF87_SIGNATURE: &[u8] = b"GIF87a";
const GIF89_SIGNATURE: &[u8] = b"GIF89a";

/// Container formats the sniffer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Also the fallback for unrecognised bytes.
    #[default]
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Detect the image format of `data`.
///
/// Total over all inputs: empty, truncated or unknown data falls back to
/// [`ImageFormat::Png`].
pub fn sniff_format(data: &[u8]) -> ImageFormat {
    if data.starts_with(PNG_SIGNATURE) {
        ImageFormat::Png
    } else if data.starts_with(JPEG_SIGNATURE) {
        ImageFormat::Jpeg
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        ImageFormat::Webp
    } else if data.starts_with(GIF87_SIGNATURE) || data.starts_with(GIF89_SIGNATURE) {
        ImageFormat::Gif
    } else {
        ImageFormat::default()
    }
}

/// Extension (without the dot) for `data`. Shorthand for
/// `sniff_format(data).extension()`.
pub fn image_extension(data: &[u8]) -> &'static str {
    sniff_format(data).extension()
}
