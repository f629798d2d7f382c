//! SQLite denial ledger.

use super::{DenialLedger, DenialRecord};
use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed denial ledger
pub struct SqliteDenialLedger {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteDenialLedger {
    /// Open or create the ledger at the given path
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

    /// Open a private in-memory ledger
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS denials (
                pair_key TEXT PRIMARY KEY,
                path_a TEXT NOT NULL,
                path_b TEXT NOT NULL,
                created_at INTEGER NOT NULL
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

impl DenialLedger for SqliteDenialLedger {
    fn get_all_keys(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT pair_key FROM denials")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    fn insert(&self, denials: &[DenialRecord]) -> Result<(), StoreError> {
        if denials.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO denials (pair_key, path_a, path_b, created_at)
                 VALUES (?, ?, ?, ?)",
            )?;
            for denial in denials {
                stmt.execute(params![
                    denial.pair_key,
                    denial.path_a,
                    denial.path_b,
                    denial.timestamp,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Recorded {} denied pairs", denials.len());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM denials", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM denials", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
