//! # Media Module
//!
//! The read-only description of one candidate asset, and the boundary the
//! engine consumes candidates through.
//!
//! The engine never walks the filesystem on its own. A caller supplies the
//! candidate list through a [`MediaSource`]; [`DirectoryMediaSource`] is the
//! walkdir-backed source the CLI uses.

mod walker;

pub use walker::{DirectoryMediaSource, SourceConfig};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One image or video supplied by the media source.
///
/// Immutable for the duration of a scan. `id` is the absolute path and is
/// the key for every store in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Absolute path; unique across the corpus
    pub id: String,
    /// Content locator understood by the thumbnail provider
    pub uri: String,
    pub display_name: String,
    pub mime_type: String,
    /// Milliseconds since the Unix epoch
    pub date_added: i64,
    /// Milliseconds since the Unix epoch
    pub date_modified: i64,
    /// Size in bytes
    pub size: u64,
    /// Containing folder, as reported by the source
    pub bucket_id: String,
    pub bucket_name: String,
    pub is_video: bool,
    pub width: u32,
    pub height: u32,
}

impl MediaItem {
    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        Path::new(&self.id)
    }
}

/// Kind of media, derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// Detect kind from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "heic" | "heif" | "gif" | "bmp" | "tiff" | "tif" => {
                MediaKind::Image
            }
            "mp4" | "m4v" | "mov" | "mkv" | "webm" | "avi" | "3gp" => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }

    /// Best-effort MIME type for an extension
    pub fn mime_type(ext: &str) -> &'static str {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "heif" => "image/heif",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tiff" | "tif" => "image/tiff",
            "mp4" | "m4v" => "video/mp4",
            "mov" => "video/quicktime",
            "mkv" => "video/x-matroska",
            "webm" => "video/webm",
            "avi" => "video/x-msvideo",
            "3gp" => "video/3gpp",
            _ => "application/octet-stream",
        }
    }
}

/// Supplies the candidate list for one scan.
///
/// Include/exclude filtering belongs to the implementation; everything it
/// returns is a candidate.
pub trait MediaSource: Send + Sync {
    /// Enumerate candidate items
    fn media_items(&self) -> Result<Vec<MediaItem>, ScanError>;
}

impl MediaSource for Vec<MediaItem> {
    fn media_items(&self) -> Result<Vec<MediaItem>, ScanError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(MediaKind::from_extension("JPG"), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("heic"), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("MOV"), MediaKind::Video);
        assert_eq!(MediaKind::from_extension("txt"), MediaKind::Unknown);
    }

    #[test]
    fn mime_type_for_known_extensions() {
        assert_eq!(MediaKind::mime_type("jpeg"), "image/jpeg");
        assert_eq!(MediaKind::mime_type("MP4"), "video/mp4");
        assert_eq!(MediaKind::mime_type("xyz"), "application/octet-stream");
    }

    #[test]
    fn vec_is_a_media_source() {
        let items: Vec<MediaItem> = Vec::new();
        assert!(items.media_items().unwrap().is_empty());
    }
}
