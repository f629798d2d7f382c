//! Video duration lookup and frame extraction through ffprobe/ffmpeg.
//!
//! Both tools are run as child processes; a missing binary or a non-zero
//! exit becomes a `FrameExtraction` error for that one file.

use super::fast_resize::bounded_thumbnail;
use crate::error::HashError;
use image::DynamicImage;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Container duration in milliseconds.
///
/// Returns 0 when the container reports no duration.
pub fn read_duration_ms(ffprobe: &Path, video: &Path) -> Result<i64, HashError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(video)
        .output()
        .map_err(|e| HashError::FrameExtraction {
            path: video.to_path_buf(),
            reason: format!("failed to run {}: {}", ffprobe.display(), e),
        })?;

    if !output.status.success() {
        return Err(HashError::FrameExtraction {
            path: video.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_duration_ms(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        HashError::FrameExtraction {
            path: video.to_path_buf(),
            reason: "unreadable duration".to_string(),
        }
    })
}

/// Parse ffprobe's duration line (seconds) into milliseconds
fn parse_duration_ms(stdout: &str) -> Option<i64> {
    let line = stdout.lines().next().unwrap_or("").trim();
    if line.is_empty() || line == "N/A" {
        return Some(0);
    }
    let seconds: f64 = line.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    Some((seconds * 1000.0).round() as i64)
}

/// Decode the frame at `at_ms`, bounded to `max_edge`
pub fn extract_frame(
    ffmpeg: &Path,
    video: &Path,
    at_ms: i64,
    max_edge: u32,
) -> Result<DynamicImage, HashError> {
    let frame_file = tempfile::Builder::new()
        .prefix("media-similarity-frame")
        .suffix(".png")
        .tempfile()
        .map_err(|e| HashError::IoError {
            path: video.to_path_buf(),
            source: e,
        })?;

    let seek = format!("{:.3}", at_ms.max(0) as f64 / 1000.0);
    debug!("Extracting frame at {}s from {}", seek, video.display());

    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-y", "-ss", &seek, "-i"])
        .arg(video)
        .args(["-frames:v", "1", "-f", "image2"])
        .arg(frame_file.path())
        .output()
        .map_err(|e| HashError::FrameExtraction {
            path: video.to_path_buf(),
            reason: format!("failed to run {}: {}", ffmpeg.display(), e),
        })?;

    if !output.status.success() {
        return Err(HashError::FrameExtraction {
            path: video.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let frame = image::open(frame_file.path()).map_err(|e| HashError::FrameExtraction {
        path: video.to_path_buf(),
        reason: format!("no frame at {}s: {}", seek, e),
    })?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(HashError::EmptyImage {
            path: video.to_path_buf(),
        });
    }

    bounded_thumbnail(frame, max_edge)
}
