//! Bitmap and frame supply for hashing.

use super::fast_decode::FastDecoder;
use super::video::{extract_frame, read_duration_ms};
use crate::core::media::MediaItem;
use crate::error::HashError;
use image::DynamicImage;
use std::path::PathBuf;

/// Supplies decoded pixels for a media item.
///
/// Failures are per item; the engine records the path as unscannable and
/// moves on.
pub trait ThumbnailProvider: Send + Sync {
    /// Decoded image, longest edge at most `max_edge`
    fn image_thumbnail(&self, item: &MediaItem, max_edge: u32) -> Result<DynamicImage, HashError>;

    /// Video duration in milliseconds; 0 or less when unknown
    fn video_duration_ms(&self, item: &MediaItem) -> Result<i64, HashError>;

    /// Frame at `at_ms`, longest edge at most `max_edge`
    fn video_frame(
        &self,
        item: &MediaItem,
        at_ms: i64,
        max_edge: u32,
    ) -> Result<DynamicImage, HashError>;
}

/// Provider reading local files: images via [`FastDecoder`], videos via
/// ffprobe/ffmpeg found on `PATH` unless overridden.
#[derive(Debug, Clone)]
pub struct LocalThumbnailProvider {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl LocalThumbnailProvider {
    pub fn new() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    /// Use specific ffprobe/ffmpeg binaries
    pub fn with_tools(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for LocalThumbnailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailProvider for LocalThumbnailProvider {
    fn image_thumbnail(&self, item: &MediaItem, max_edge: u32) -> Result<DynamicImage, HashError> {
        FastDecoder::decode_thumbnail(item.path(), max_edge)
    }

    fn video_duration_ms(&self, item: &MediaItem) -> Result<i64, HashError> {
        read_duration_ms(&self.ffprobe, item.path())
    }

    fn video_frame(
        &self,
        item: &MediaItem,
        at_ms: i64,
        max_edge: u32,
    ) -> Result<DynamicImage, HashError> {
        extract_frame(&self.ffmpeg, item.path(), at_ms, max_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;
    use crate::error::HashError;

    #[test]
    fn missing_tools_fail_per_item() {
        let provider = LocalThumbnailProvider::with_tools(
            "/nonexistent/bin/ffprobe",
            "/nonexistent/bin/ffmpeg",
        );
        let clip = media_item("/videos/clip.mp4", 1_000, 10, true);

        assert!(matches!(
            provider.video_duration_ms(&clip),
            Err(HashError::FrameExtraction { .. })
        ));
        assert!(provider.video_frame(&clip, 500, 64).is_err());
    }

    #[test]
    fn unreadable_images_are_errors() {
        let provider = LocalThumbnailProvider::new();
        let photo = media_item("/nonexistent/photo.jpg", 1_000, 10, false);
        assert!(provider.image_thumbnail(&photo, 64).is_err());
    }
}
