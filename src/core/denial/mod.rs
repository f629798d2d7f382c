//! # Denial Module
//!
//! The ledger of file pairs a user has marked as "not actually similar".
//!
//! A recorded pair vetoes that match in every later scan, whatever the
//! hashes say. Keys are built from the two paths alone so the ledger
//! survives changes to the hashing algorithm.

mod memory;
mod sqlite;

pub use memory::InMemoryDenialLedger;
pub use sqlite::SqliteDenialLedger;

use crate::core::media::MediaItem;
use crate::core::results::ScanResultGroup;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between the two paths of a pair key. NUL cannot appear in a
/// path, so distinct pairs never share a key.
pub const PAIR_KEY_SEPARATOR: char = '\0';

/// Symmetric key for an unordered pair of paths
pub fn pair_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, PAIR_KEY_SEPARATOR, second)
}

/// One denied pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialRecord {
    pub pair_key: String,
    /// Lexicographically smaller path
    pub path_a: String,
    /// Lexicographically larger path
    pub path_b: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

impl DenialRecord {
    /// Build the record for an unordered pair
    pub fn new(a: &str, b: &str, timestamp: i64) -> Self {
        let (path_a, path_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            pair_key: pair_key(a, b),
            path_a: path_a.to_string(),
            path_b: path_b.to_string(),
            timestamp,
        }
    }
}

/// Every pairwise record for a set of items: n·(n−1)/2 of them.
pub fn denials_for_items(items: &[MediaItem], timestamp: i64) -> Vec<DenialRecord> {
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    denials_for_paths(&ids, timestamp)
}

/// Every pairwise record for a set of paths. Repeated paths never pair
/// with themselves.
pub fn denials_for_paths<S: AsRef<str>>(paths: &[S], timestamp: i64) -> Vec<DenialRecord> {
    let mut records = Vec::with_capacity(paths.len() * paths.len().saturating_sub(1) / 2);
    for (i, a) in paths.iter().enumerate() {
        for b in &paths[i + 1..] {
            if a.as_ref() != b.as_ref() {
                records.push(DenialRecord::new(a.as_ref(), b.as_ref(), timestamp));
            }
        }
    }
    records
}

/// Persistent set of denied pairs
pub trait DenialLedger: Send + Sync {
    /// Snapshot of every denied pair key
    fn get_all_keys(&self) -> Result<HashSet<String>, StoreError>;

    /// Record denials; existing keys are left untouched
    fn insert(&self, denials: &[DenialRecord]) -> Result<(), StoreError>;

    /// Forget every denial
    fn clear(&self) -> Result<(), StoreError>;

    /// Flag a whole group as incorrect: deny every pair within it
    fn deny_group(&self, group: &ScanResultGroup) -> Result<usize, StoreError> {
        let records = denials_for_items(group.items(), chrono::Utc::now().timestamp_millis());
        self.insert(&records)?;
        Ok(records.len())
    }

    /// Number of denied pairs
    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.get_all_keys()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;

    #[test]
    fn pair_key_is_symmetric() {
        assert_eq!(pair_key("/a.jpg", "/b.jpg"), pair_key("/b.jpg", "/a.jpg"));
        assert_eq!(pair_key("/a.jpg", "/b.jpg"), "/a.jpg\0/b.jpg");
    }

    #[test]
    fn pipes_in_paths_do_not_collide() {
        assert_ne!(pair_key("/a|b", "/c"), pair_key("/a", "/b|/c"));
        assert_ne!(pair_key("/x|/y", "/z"), pair_key("/x", "/y|/z"));
    }

    #[test]
    fn record_orders_paths() {
        let record = DenialRecord::new("/z.jpg", "/a.jpg", 7);
        assert_eq!(record.path_a, "/a.jpg");
        assert_eq!(record.path_b, "/z.jpg");
        assert_eq!(record.pair_key, pair_key("/a.jpg", "/z.jpg"));
    }

    #[test]
    fn group_of_n_yields_all_pairs() {
        let items: Vec<_> = ["/a", "/b", "/c", "/d"]
            .iter()
            .map(|p| media_item(p, 1, 1, false))
            .collect();

        let records = denials_for_items(&items, 0);
        assert_eq!(records.len(), 6);

        let keys: HashSet<_> = records.iter().map(|r| r.pair_key.clone()).collect();
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&pair_key("/d", "/a")));
    }

    #[test]
    fn repeated_paths_never_pair_with_themselves() {
        let paths = vec!["/a".to_string(), "/b".to_string(), "/a".to_string()];
        let records = denials_for_paths(&paths, 0);

        assert!(records.iter().all(|r| r.path_a != r.path_b));
        let keys: HashSet<_> = records.iter().map(|r| r.pair_key.clone()).collect();
        assert_eq!(keys, HashSet::from([pair_key("/a", "/b")]));
    }
}
