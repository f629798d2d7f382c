//! # Exact Module
//!
//! Byte-identical duplicate detection.
//!
//! Files are narrowed down in three passes, each cheaper than the next:
//! 1. **Size** - files with a unique size cannot have a twin
//! 2. **Prefix** - xxh3 of the first 4 KiB
//! 3. **Content** - full SHA-256, memory-mapped for files of 1 MiB or more
//!
//! Every remaining class of two or more files becomes a
//! [`DuplicateGroup`](crate::core::results::DuplicateGroup) keyed by the
//! SHA-256 hex digest.

use crate::core::hasher::default_chunk_size;
use crate::core::media::MediaItem;
use crate::core::pipeline::CancellationToken;
use crate::core::results::{sort_by_total_size, ScanResultGroup};
use crate::error::HashError;
use memmap2::Mmap;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Bytes read for the prefix pass
const PREFIX_SIZE: usize = 4096;

/// Files at least this large are memory-mapped
const MMAP_THRESHOLD: u64 = 1024 * 1024;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Result of one exact-duplicate pass
#[derive(Debug, Default)]
pub struct ExactOutcome {
    pub groups: Vec<ScanResultGroup>,
    /// Files that could not be read
    pub unscannable: Vec<String>,
    pub cancelled: bool,
}

/// Finds byte-identical files
pub struct ExactMatcher {
    chunk_size: usize,
}

impl ExactMatcher {
    pub fn new() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Group byte-identical items, largest groups first.
    ///
    /// Empty files are ignored, as are repeats of an id already seen.
    pub fn find_duplicates(&self, items: &[MediaItem], cancel: &CancellationToken) -> ExactOutcome {
        let mut outcome = ExactOutcome::default();

        let mut seen = HashSet::new();
        let mut by_size: HashMap<u64, Vec<&MediaItem>> = HashMap::new();
        for item in items
            .iter()
            .filter(|i| i.size > 0 && seen.insert(i.id.as_str()))
        {
            by_size.entry(item.size).or_default().push(item);
        }
        let sized: Vec<&MediaItem> = by_size
            .into_values()
            .filter(|class| class.len() >= 2)
            .flatten()
            .collect();
        debug!("{} files share a size with another file", sized.len());

        let prefixed = self.digest_all(&sized, cancel, &mut outcome, |item| {
            prefix_digest(item.path())
        });
        let prefix_candidates = classes_of_two(prefixed, |item, prefix| (item.size, *prefix));
        if outcome.cancelled {
            return outcome;
        }

        let digested = self.digest_all(&prefix_candidates, cancel, &mut outcome, |item| {
            content_digest(item.path())
        });
        if outcome.cancelled {
            return outcome;
        }

        let mut by_content: HashMap<(u64, String), Vec<MediaItem>> = HashMap::new();
        for (item, digest) in digested {
            by_content
                .entry((item.size, digest))
                .or_default()
                .push(item.clone());
        }

        outcome.groups = by_content
            .into_iter()
            .filter_map(|((size, digest), class)| ScanResultGroup::duplicate(digest, class, size))
            .collect();
        sort_by_total_size(&mut outcome.groups);

        debug!("Found {} exact duplicate groups", outcome.groups.len());
        outcome
    }

    /// Apply `digest` to every item, chunk by chunk in parallel
    fn digest_all<'a, T, F>(
        &self,
        items: &[&'a MediaItem],
        cancel: &CancellationToken,
        outcome: &mut ExactOutcome,
        digest: F,
    ) -> Vec<(&'a MediaItem, T)>
    where
        T: Send,
        F: Fn(&MediaItem) -> Result<T, HashError> + Sync,
    {
        let mut digests = Vec::with_capacity(items.len());

        for chunk in items.chunks(self.chunk_size) {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let results: Vec<(&'a MediaItem, Result<T, HashError>)> = chunk
                .par_iter()
                .map(|&item| (item, digest(item)))
                .collect();

            for (item, result) in results {
                match result {
                    Ok(value) => digests.push((item, value)),
                    Err(e) => {
                        warn!("Cannot read {}: {}", item.id, e);
                        if !outcome.unscannable.contains(&item.id) {
                            outcome.unscannable.push(item.id.clone());
                        }
                    }
                }
            }
        }

        digests
    }
}

impl Default for ExactMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Items whose key is shared with at least one other item
fn classes_of_two<'a, T, K, F>(digests: Vec<(&'a MediaItem, T)>, key: F) -> Vec<&'a MediaItem>
where
    K: std::hash::Hash + Eq,
    F: Fn(&MediaItem, &T) -> K,
{
    let mut classes: HashMap<K, Vec<&'a MediaItem>> = HashMap::new();
    for (item, value) in digests {
        classes.entry(key(item, &value)).or_default().push(item);
    }
    classes
        .into_values()
        .filter(|class| class.len() >= 2)
        .flatten()
        .collect()
}

/// xxh3 of the first 4 KiB
pub fn prefix_digest(path: &Path) -> Result<u64, HashError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut buffer = [0u8; PREFIX_SIZE];
    let mut filled = 0;
    while filled < PREFIX_SIZE {
        let read = file
            .read(&mut buffer[filled..])
            .map_err(|e| io_error(path, e))?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(xxh3_64(&buffer[..filled]))
}

/// SHA-256 of the whole file as lowercase hex
pub fn content_digest(path: &Path) -> Result<String, HashError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let len = file.metadata().map_err(|e| io_error(path, e))?.len();
    let mut hasher = Sha256::new();

    if len >= MMAP_THRESHOLD {
        // SAFETY: read-only mapping; the file handle outlives the map.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(path, e))?;
        hasher.update(&mmap[..]);
    } else {
        let mut reader = file;
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = reader.read(&mut buffer).map_err(|e| io_error(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn io_error(path: &Path, source: std::io::Error) -> HashError {
    HashError::IoError {
        path: path.to_path_buf(),
        source,
    }
}
