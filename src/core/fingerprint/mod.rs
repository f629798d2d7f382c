//! # Fingerprint Module
//!
//! Persists perceptual hashes so a scan only re-hashes what changed.
//!
//! An entry is recomputed when it is missing, when the stored
//! (modification time, size) pair disagrees with the current file, or when
//! an image entry predates colour histograms. Paths that leave the
//! candidate set are purged at the end of a pass.
//!
//! ## Backends
//! - `SqliteFingerprintStore` - Persistent storage using SQLite
//! - `InMemoryFingerprintStore` - For testing

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryFingerprintStore;
pub use sqlite::SqliteFingerprintStore;
pub use traits::FingerprintStore;

use crate::core::media::MediaItem;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stored fingerprint for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// Absolute path (store key)
    pub file_path: String,
    /// Modification time at hashing, milliseconds since the epoch
    pub last_modified: i64,
    /// File size at hashing
    pub size: u64,
    /// Single dHash for images, comma-joined frame hashes for video
    pub perceptual_hash: String,
    /// Comma-separated 64-bin colour histogram (images only)
    pub histogram: Option<String>,
}

impl FingerprintEntry {
    /// Whether this entry must be recomputed for the current state of `item`
    pub fn needs_recompute(&self, item: &MediaItem) -> bool {
        self.last_modified != item.date_modified
            || self.size != item.size
            || (!item.is_video && self.histogram.is_none())
    }
}

/// Items whose fingerprint is missing or stale
pub fn items_needing_hash<'a>(
    items: &'a [MediaItem],
    existing: &HashMap<String, FingerprintEntry>,
) -> Vec<&'a MediaItem> {
    items
        .iter()
        .filter(|item| {
            existing
                .get(&item.id)
                .map(|entry| entry.needs_recompute(item))
                .unwrap_or(true)
        })
        .collect()
}

/// Stored paths that are no longer candidates
pub fn orphaned_paths(
    existing: &HashMap<String, FingerprintEntry>,
    candidates: &HashSet<String>,
) -> Vec<String> {
    let mut orphans: Vec<String> = existing
        .keys()
        .filter(|path| !candidates.contains(*path))
        .cloned()
        .collect();
    orphans.sort();
    orphans
}
