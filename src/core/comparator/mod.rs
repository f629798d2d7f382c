//! # Comparator Module
//!
//! Clusters fingerprinted media into groups of similar items.
//!
//! ## How It Works
//! 1. Split candidates into images and videos; each partition is
//!    clustered on its own, concurrently
//! 2. Bucket each partition by the first two characters of the hash, so
//!    an item is only compared with items in its own and adjacent buckets
//! 3. Grow groups breadth-first from a seed through every match, skipping
//!    pairs the user has denied
//!
//! ## Thresholds
//! | Sensitivity | dHash | Histogram | Video frame |
//! |-------------|-------|-----------|-------------|
//! | Strict      | 3     | 0.35      | 2           |
//! | Balanced    | 5     | 0.50      | 4           |
//! | Loose       | 8     | 0.65      | 7           |
//!
//! Screenshots use a dHash threshold of 2 at every level; flat UI
//! captures hash alike far more often than photos do.
//!
//! Groups chain: A–B and B–C put A, B and C together even when A and C
//! would not match on their own.

mod bucket;
mod cluster;
mod rules;

pub use bucket::{bucket_key, BucketIndex};
pub use cluster::{ClusterRequest, ClusteringEngine, IMAGE_GROUP_PREFIX, VIDEO_GROUP_PREFIX};
pub use rules::{Candidate, ImageRule, SimilarityRule, VideoRule};

use crate::core::media::MediaItem;
use serde::{Deserialize, Serialize};

/// dHash threshold applied when either side looks like a screenshot
pub const SCREENSHOT_HASH_THRESHOLD: u32 = 2;

/// How tolerant matching is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sensitivity {
    Strict,
    #[default]
    Balanced,
    Loose,
}

impl Sensitivity {
    /// Maximum dHash distance between two images
    pub fn image_hash_threshold(&self) -> u32 {
        match self {
            Sensitivity::Strict => 3,
            Sensitivity::Balanced => 5,
            Sensitivity::Loose => 8,
        }
    }

    /// Maximum histogram distance between two images
    pub fn histogram_threshold(&self) -> f64 {
        match self {
            Sensitivity::Strict => 0.35,
            Sensitivity::Balanced => 0.5,
            Sensitivity::Loose => 0.65,
        }
    }

    /// Maximum dHash distance between any two video frames
    pub fn video_hash_threshold(&self) -> u32 {
        match self {
            Sensitivity::Strict => 2,
            Sensitivity::Balanced => 4,
            Sensitivity::Loose => 7,
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Strict => write!(f, "strict"),
            Sensitivity::Balanced => write!(f, "balanced"),
            Sensitivity::Loose => write!(f, "loose"),
        }
    }
}

/// Path has a `screenshots` directory segment, or the file name starts
/// with `screen` (both case-insensitive)
pub fn is_screenshot_like(item: &MediaItem) -> bool {
    item.id.to_lowercase().contains("/screenshots/")
        || item.display_name.to_lowercase().starts_with("screen")
}
