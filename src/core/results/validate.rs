//! Revalidation of cached results against the file system.
//!
//! A cached group is only worth showing if its files are still the files
//! that were compared. Anything deleted, resized or touched since the scan
//! is dropped before the results reach the user.

use super::{LoadedScanResults, ScanResultCache, ScanResultGroup};
use crate::core::media::MediaItem;
use crate::error::StoreError;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// What the file system currently reports for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// Milliseconds since the epoch
    pub modified_ms: i64,
    pub size: u64,
}

/// Source of current file stamps
pub trait FileStat: Send + Sync {
    /// `None` when the path no longer exists or cannot be read
    fn stat(&self, path: &str) -> Option<FileStamp>;
}

/// Lookup backed by `std::fs::metadata`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStat;

impl FileStat for LocalFileStat {
    fn stat(&self, path: &str) -> Option<FileStamp> {
        let metadata = std::fs::metadata(Path::new(path)).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Some(FileStamp {
            modified_ms,
            size: metadata.len(),
        })
    }
}

/// Filters cached results down to what is still true on disk
pub struct ResultValidator<P: FileStat = LocalFileStat> {
    stat: P,
}

impl Default for ResultValidator<LocalFileStat> {
    fn default() -> Self {
        Self::new(LocalFileStat)
    }
}

impl<P: FileStat> ResultValidator<P> {
    pub fn new(stat: P) -> Self {
        Self { stat }
    }

    /// File exists with the recorded size and modification second.
    ///
    /// Seconds are compared because some file systems only keep that much.
    pub fn is_item_current(&self, item: &MediaItem) -> bool {
        match self.stat.stat(&item.id) {
            Some(stamp) => {
                stamp.size == item.size
                    && stamp.modified_ms.div_euclid(1000) == item.date_modified.div_euclid(1000)
            }
            None => false,
        }
    }

    /// Surviving members of a group; `None` below two
    pub fn revalidate_group(&self, group: &ScanResultGroup) -> Option<ScanResultGroup> {
        let items: Vec<MediaItem> = group
            .items()
            .iter()
            .filter(|item| self.is_item_current(item))
            .cloned()
            .collect();

        if items.len() == group.items().len() {
            return Some(group.clone());
        }
        group.with_items(items)
    }

    /// Revalidate every group and unscannable path
    pub fn revalidate(&self, results: LoadedScanResults) -> LoadedScanResults {
        let groups = results
            .groups
            .iter()
            .filter_map(|g| self.revalidate_group(g))
            .collect();
        let unscannable = results
            .unscannable
            .into_iter()
            .filter(|path| self.stat.stat(path).is_some())
            .collect();

        LoadedScanResults {
            groups,
            unscannable,
            timestamp: results.timestamp,
            scope: results.scope,
        }
    }

    /// Latest cached results that still hold; `None` when nothing survives
    pub fn load_validated(
        &self,
        cache: &ScanResultCache,
    ) -> Result<Option<LoadedScanResults>, StoreError> {
        Ok(cache
            .load_latest_scan_results()?
            .map(|results| self.revalidate(results))
            .filter(|results| !results.is_empty()))
    }

    /// Whether any cached result would survive revalidation.
    ///
    /// Stops at the first valid group or existing unscannable path.
    pub fn has_valid_cached_results(&self, cache: &ScanResultCache) -> Result<bool, StoreError> {
        let Some(results) = cache.load_latest_scan_results()? else {
            return Ok(false);
        };

        Ok(results
            .groups
            .iter()
            .any(|g| self.revalidate_group(g).is_some())
            || results
                .unscannable
                .iter()
                .any(|path| self.stat.stat(path).is_some()))
    }
}
