//! # Results Module
//!
//! The result model of a scan and its persisted, revalidated cache.
//!
//! ## Groups
//! A [`ScanResultGroup`] is either a byte-identical [`DuplicateGroup`]
//! (identified by content signature) or a look-alike [`SimilarGroup`]
//! (identified by its representative hash). A group always holds at least
//! two items; constructors refuse anything smaller.
//!
//! ## Scopes
//! - `Full` - a whole-corpus scan. Saving it clears both scopes.
//! - `Scoped` - a user-limited subset. Saving it clears only prior scoped
//!   results. Loading prefers scoped over full.

mod sqlite;
mod validate;

pub use sqlite::{ScanResultCache, UNSCANNABLE_GROUP_KEY};
pub use validate::{FileStat, FileStamp, LocalFileStat, ResultValidator};

use crate::core::media::MediaItem;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Whether a scan covered the whole corpus or a user-limited subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanScope {
    Full,
    Scoped,
}

impl ScanScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanScope::Full => "FULL",
            ScanScope::Scoped => "SCOPED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FULL" => Some(ScanScope::Full),
            "SCOPED" => Some(ScanScope::Scoped),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-identical files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content digest shared by every item
    pub signature: String,
    pub items: Vec<MediaItem>,
    /// Size of each file
    pub file_size: u64,
}

/// Visually similar files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarGroup {
    /// Partition tag plus the seed item's hash, e.g. `img-<hash>`
    pub representative_hash: String,
    pub items: Vec<MediaItem>,
}

/// One group produced by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanResultGroup {
    Duplicate(DuplicateGroup),
    Similar(SimilarGroup),
}

impl ScanResultGroup {
    /// Build a duplicate group; `None` when fewer than two items remain
    pub fn duplicate(signature: String, mut items: Vec<MediaItem>, file_size: u64) -> Option<Self> {
        if items.len() < 2 {
            return None;
        }
        sort_by_date(&mut items);
        Some(ScanResultGroup::Duplicate(DuplicateGroup {
            signature,
            items,
            file_size,
        }))
    }

    /// Build a similar group; `None` when fewer than two items remain
    pub fn similar(representative_hash: String, mut items: Vec<MediaItem>) -> Option<Self> {
        if items.len() < 2 {
            return None;
        }
        sort_by_date(&mut items);
        Some(ScanResultGroup::Similar(SimilarGroup {
            representative_hash,
            items,
        }))
    }

    /// Stable identity: content signature or representative hash
    pub fn id(&self) -> &str {
        match self {
            ScanResultGroup::Duplicate(g) => &g.signature,
            ScanResultGroup::Similar(g) => &g.representative_hash,
        }
    }

    pub fn items(&self) -> &[MediaItem] {
        match self {
            ScanResultGroup::Duplicate(g) => &g.items,
            ScanResultGroup::Similar(g) => &g.items,
        }
    }

    /// Same group with a different membership; `None` below two items
    pub fn with_items(&self, items: Vec<MediaItem>) -> Option<Self> {
        match self {
            ScanResultGroup::Duplicate(g) => {
                Self::duplicate(g.signature.clone(), items, g.file_size)
            }
            ScanResultGroup::Similar(g) => Self::similar(g.representative_hash.clone(), items),
        }
    }

    /// Digest of the sorted item ids.
    ///
    /// Distinguishes memberships even when a stable id is reused.
    pub fn composition_id(&self) -> String {
        composition_id(self.items())
    }

    /// Sum of member sizes
    pub fn total_size(&self) -> u64 {
        match self {
            ScanResultGroup::Duplicate(g) => g.file_size * g.items.len() as u64,
            ScanResultGroup::Similar(g) => g.items.iter().map(|i| i.size).sum(),
        }
    }

    /// Bytes freed by keeping only the first item
    pub fn reclaimable_bytes(&self) -> u64 {
        match self {
            ScanResultGroup::Duplicate(g) => g.file_size * (g.items.len() as u64 - 1),
            ScanResultGroup::Similar(g) => g.items.iter().skip(1).map(|i| i.size).sum(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScanResultGroup::Duplicate(_) => "duplicate",
            ScanResultGroup::Similar(_) => "similar",
        }
    }
}

/// SHA-256 over the sorted ids, newline-joined, as lowercase hex
pub fn composition_id(items: &[MediaItem]) -> String {
    let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(ids.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Newest first by modification date; ties broken by id
pub fn sort_by_date(items: &mut [MediaItem]) {
    items.sort_by(|a, b| {
        b.date_modified
            .cmp(&a.date_modified)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Largest reclaim opportunity first
pub fn sort_by_total_size(groups: &mut [ScanResultGroup]) {
    groups.sort_by(|a, b| {
        b.total_size()
            .cmp(&a.total_size())
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Groups and unscannable files read back from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedScanResults {
    pub groups: Vec<ScanResultGroup>,
    pub unscannable: Vec<String>,
    /// When the scan was saved, milliseconds since the epoch
    pub timestamp: i64,
    /// Scope the results were actually loaded from
    pub scope: ScanScope,
}

impl LoadedScanResults {
    /// Nothing worth offering to the user
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.unscannable.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;

    #[test]
    fn groups_need_two_items() {
        let one = vec![media_item("/a.jpg", 1, 10, false)];
        assert!(ScanResultGroup::similar("img-x".into(), one.clone()).is_none());
        assert!(ScanResultGroup::duplicate("sig".into(), one, 10).is_none());
    }

    #[test]
    fn items_are_ordered_newest_first() {
        let group = ScanResultGroup::similar(
            "img-x".into(),
            vec![
                media_item("/old.jpg", 100, 10, false),
                media_item("/new.jpg", 300, 10, false),
                media_item("/mid.jpg", 200, 10, false),
            ],
        )
        .unwrap();

        let ids: Vec<_> = group.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["/new.jpg", "/mid.jpg", "/old.jpg"]);
    }

    #[test]
    fn composition_id_ignores_order() {
        let a = media_item("/a.jpg", 1, 10, false);
        let b = media_item("/b.jpg", 2, 10, false);
        assert_eq!(
            composition_id(&[a.clone(), b.clone()]),
            composition_id(&[b.clone(), a.clone()])
        );
        assert_ne!(
            composition_id(&[a.clone(), b]),
            composition_id(&[a, media_item("/c.jpg", 2, 10, false)])
        );
    }

    #[test]
    fn sizes_per_variant() {
        let dup = ScanResultGroup::duplicate(
            "sig".into(),
            vec![media_item("/a", 1, 100, false), media_item("/b", 2, 100, false)],
            100,
        )
        .unwrap();
        assert_eq!(dup.total_size(), 200);
        assert_eq!(dup.reclaimable_bytes(), 100);

        let sim = ScanResultGroup::similar(
            "img-x".into(),
            vec![media_item("/a", 2, 100, false), media_item("/b", 1, 50, false)],
        )
        .unwrap();
        assert_eq!(sim.total_size(), 150);
        assert_eq!(sim.reclaimable_bytes(), 50);
    }

    #[test]
    fn total_size_ordering_is_descending() {
        let small = ScanResultGroup::similar(
            "img-small".into(),
            vec![media_item("/a", 1, 1, false), media_item("/b", 1, 1, false)],
        )
        .unwrap();
        let large = ScanResultGroup::similar(
            "img-large".into(),
            vec![media_item("/c", 1, 100, false), media_item("/d", 1, 100, false)],
        )
        .unwrap();

        let mut groups = vec![small, large];
        sort_by_total_size(&mut groups);
        assert_eq!(groups[0].id(), "img-large");
    }

    #[test]
    fn scope_round_trips_through_strings() {
        assert_eq!(ScanScope::from_str(ScanScope::Full.as_str()), Some(ScanScope::Full));
        assert_eq!(ScanScope::from_str("SCOPED"), Some(ScanScope::Scoped));
        assert_eq!(ScanScope::from_str("partial"), None);
    }
}
