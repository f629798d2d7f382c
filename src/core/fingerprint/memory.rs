//! In-memory fingerprint store for testing.

use super::{FingerprintEntry, FingerprintStore};
use crate::error::StoreError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// In-memory fingerprint store
pub struct InMemoryFingerprintStore {
    entries: RwLock<HashMap<String, FingerprintEntry>>,
}

impl InMemoryFingerprintStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryFingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintStore for InMemoryFingerprintStore {
    fn get_all(&self) -> Result<HashMap<String, FingerprintEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.clone())
    }

    fn upsert(&self, batch: &[FingerprintEntry]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        for entry in batch {
            entries.insert(entry.file_path.clone(), entry.clone());
        }
        Ok(())
    }

    fn delete_by_paths(&self, paths: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        for path in paths {
            entries.remove(path);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::entry;

    #[test]
    fn upsert_replaces_existing_entry() {
        let store = InMemoryFingerprintStore::new();
        store.upsert(&[entry("/a.jpg", 1, 10, None)]).unwrap();
        store.upsert(&[entry("/a.jpg", 2, 20, Some("0"))]).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["/a.jpg"].size, 20);
    }

    #[test]
    fn delete_by_paths_removes_only_named() {
        let store = InMemoryFingerprintStore::new();
        store
            .upsert(&[entry("/a.jpg", 1, 1, None), entry("/b.jpg", 1, 1, None)])
            .unwrap();

        store.delete_by_paths(&["/a.jpg".to_string()]).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get_all().unwrap().contains_key("/b.jpg"));
    }

    #[test]
    fn clear_removes_everything() {
        let store = InMemoryFingerprintStore::new();
        store.upsert(&[entry("/a.jpg", 1, 1, None)]).unwrap();
        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }
}
