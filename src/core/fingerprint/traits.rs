//! Fingerprint store trait definition.

use super::FingerprintEntry;
use crate::error::StoreError;
use std::collections::HashMap;

/// Key-value store of fingerprints, keyed by file path.
///
/// Upserts are per-entry idempotent, so a partially written batch is safe
/// to retry or resume.
pub trait FingerprintStore: Send + Sync {
    /// Snapshot of every stored entry
    fn get_all(&self) -> Result<HashMap<String, FingerprintEntry>, StoreError>;

    /// Insert or replace entries
    fn upsert(&self, entries: &[FingerprintEntry]) -> Result<(), StoreError>;

    /// Remove entries for the given paths
    fn delete_by_paths(&self, paths: &[String]) -> Result<(), StoreError>;

    /// Remove every entry
    fn clear(&self) -> Result<(), StoreError>;

    /// Number of stored entries
    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.get_all()?.len())
    }
}
