//! SQLite fingerprint store for persistent storage.

use super::{FingerprintEntry, FingerprintStore};
use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed fingerprint store.
///
/// Uses WAL mode so it can share a database file with the other stores.
pub struct SqliteFingerprintStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteFingerprintStore {
    /// Open or create the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::with_connection(conn, path.to_path_buf())
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS fingerprints (
                path TEXT PRIMARY KEY,
                last_modified INTEGER NOT NULL,
                size INTEGER NOT NULL,
                perceptual_hash TEXT NOT NULL,
                histogram TEXT
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }
}

impl FingerprintStore for SqliteFingerprintStore {
    fn get_all(&self) -> Result<HashMap<String, FingerprintEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT path, last_modified, size, perceptual_hash, histogram FROM fingerprints",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(FingerprintEntry {
                file_path: row.get(0)?,
                last_modified: row.get(1)?,
                size: row.get::<_, i64>(2)? as u64,
                perceptual_hash: row.get(3)?,
                histogram: row.get(4)?,
            })
        })?;

        let mut entries = HashMap::new();
        for row in rows {
            let entry = row?;
            entries.insert(entry.file_path.clone(), entry);
        }
        Ok(entries)
    }

    fn upsert(&self, entries: &[FingerprintEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO fingerprints
                 (path, last_modified, size, perceptual_hash, histogram)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.file_path,
                    entry.last_modified,
                    entry.size as i64,
                    entry.perceptual_hash,
                    entry.histogram,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_paths(&self, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM fingerprints WHERE path = ?")?;
            for path in paths {
                stmt.execute([path])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM fingerprints", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::entry;
    use tempfile::TempDir;

    #[test]
    fn creates_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("engine.db");

        let store = SqliteFingerprintStore::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn stores_and_retrieves_entries() {
        let store = SqliteFingerprintStore::open_in_memory().unwrap();
        store
            .upsert(&[
                entry("/a.jpg", 1_700_000_000_123, 1000, Some("1,2,3")),
                entry("/b.mp4", 42, 2000, None),
            ])
            .unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["/a.jpg"].last_modified, 1_700_000_000_123);
        assert_eq!(all["/a.jpg"].histogram.as_deref(), Some("1,2,3"));
        assert_eq!(all["/b.mp4"].histogram, None);
    }

    #[test]
    fn upsert_overwrites_by_path() {
        let store = SqliteFingerprintStore::open_in_memory().unwrap();
        store.upsert(&[entry("/a.jpg", 1, 10, None)]).unwrap();
        store.upsert(&[entry("/a.jpg", 2, 20, Some("5"))]).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["/a.jpg"].last_modified, 2);
    }

    #[test]
    fn deletes_by_path() {
        let store = SqliteFingerprintStore::open_in_memory().unwrap();
        store
            .upsert(&[entry("/a.jpg", 1, 1, None), entry("/b.jpg", 1, 1, None)])
            .unwrap();

        store.delete_by_paths(&["/a.jpg".to_string()]).unwrap();

        let all = store.get_all().unwrap();
        assert!(!all.contains_key("/a.jpg"));
        assert!(all.contains_key("/b.jpg"));
    }

    #[test]
    fn persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("engine.db");

        {
            let store = SqliteFingerprintStore::open(&db_path).unwrap();
            store.upsert(&[entry("/a.jpg", 1, 1, Some("0"))]).unwrap();
        }

        let store = SqliteFingerprintStore::open(&db_path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
