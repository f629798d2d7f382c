//! Image decoding with format-specific fast paths.
//!
//! JPEG goes through zune-jpeg; HEIC is converted by `sips` on macOS;
//! everything else falls back to the image crate. Decoded images are
//! shrunk to a bounded thumbnail before hashing.

use super::fast_resize::bounded_thumbnail;
use crate::error::HashError;
use image::{DynamicImage, ImageBuffer};
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Formats with a dedicated decode path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Heic,
    Other,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("heic" | "heif") => Self::Heic,
            _ => Self::Other,
        }
    }
}

/// Decoder that routes each format to its fastest path
pub struct FastDecoder;

impl FastDecoder {
    /// Decode at full resolution
    pub fn decode(path: &Path) -> Result<DynamicImage, HashError> {
        let image = match ImageFormat::from_path(path) {
            ImageFormat::Jpeg => Self::decode_jpeg(path).or_else(|_| Self::decode_fallback(path)),
            ImageFormat::Heic => Self::decode_heic(path).or_else(|_| Self::decode_fallback(path)),
            ImageFormat::Other => Self::decode_fallback(path),
        }?;

        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        Ok(image)
    }

    /// Decode and shrink so the longest edge is at most `max_edge`
    pub fn decode_thumbnail(path: &Path, max_edge: u32) -> Result<DynamicImage, HashError> {
        bounded_thumbnail(Self::decode(path)?, max_edge)
    }

    fn decode_jpeg(path: &Path) -> Result<DynamicImage, HashError> {
        let file_bytes = fs::read(path).map_err(|e| HashError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(&file_bytes, options);

        let pixels = decoder.decode().map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg: {:?}", e),
        })?;
        let info = decoder.info().ok_or_else(|| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "missing image info".to_string(),
        })?;
        let (width, height) = (u32::from(info.width), u32::from(info.height));

        let colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);
        let image = match colorspace {
            ColorSpace::RGB => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
            ColorSpace::Luma => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
            _ => return Self::decode_fallback(path),
        };

        image.ok_or_else(|| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("pixel buffer does not match {}x{}", width, height),
        })
    }

    /// HEIC through the built-in `sips` converter
    #[cfg(target_os = "macos")]
    fn decode_heic(path: &Path) -> Result<DynamicImage, HashError> {
        use std::process::Command;

        let converted = tempfile::Builder::new()
            .prefix("media-similarity-heic")
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| HashError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?;

        let output = Command::new("sips")
            .args(["-s", "format", "jpeg"])
            .arg(path)
            .arg("--out")
            .arg(converted.path())
            .output()
            .map_err(|e| HashError::DecodeError {
                path: path.to_path_buf(),
                reason: format!("failed to run sips: {}", e),
            })?;

        if !output.status.success() {
            return Err(HashError::DecodeError {
                path: path.to_path_buf(),
                reason: format!(
                    "sips conversion failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        image::open(converted.path()).map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("converted HEIC unreadable: {}", e),
        })
    }

    #[cfg(not(target_os = "macos"))]
    fn decode_heic(path: &Path) -> Result<DynamicImage, HashError> {
        Err(HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "HEIC decoding is only supported on macOS".to_string(),
        })
    }

    fn decode_fallback(path: &Path) -> Result<DynamicImage, HashError> {
        image::open(path).map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
