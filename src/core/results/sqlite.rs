//! SQLite scan result cache.
//!
//! Each save replaces the stored snapshot for its scope inside one
//! transaction: either the whole new snapshot is visible or the old one is.

use super::{LoadedScanResults, ScanResultGroup, ScanScope};
use crate::core::media::MediaItem;
use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Group key of the sentinel row listing unscannable files
pub const UNSCANNABLE_GROUP_KEY: &str = "__unscannable__";

const KIND_DUPLICATE: &str = "duplicate";
const KIND_SIMILAR: &str = "similar";
const KIND_UNSCANNABLE: &str = "unscannable";

/// Persisted scan results, partitioned by scope
pub struct ScanResultCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

struct GroupRow {
    id: i64,
    group_key: String,
    kind: String,
    file_size: i64,
    saved_at: i64,
    payload: Option<String>,
}

impl ScanResultCache {
    /// Open or create the cache at the given path
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

    /// Open a private in-memory cache
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scan_result_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope TEXT NOT NULL,
                group_key TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                composition_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                saved_at INTEGER NOT NULL,
                payload TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_result_groups_scope
                ON scan_result_groups(scope, position);
            CREATE TABLE IF NOT EXISTS scan_result_items (
                group_row INTEGER NOT NULL,
                position INTEGER NOT NULL,
                path TEXT NOT NULL,
                PRIMARY KEY (group_row, position)
            );
            CREATE TABLE IF NOT EXISTS scan_result_media (
                scope TEXT NOT NULL,
                path TEXT NOT NULL,
                uri TEXT NOT NULL,
                display_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                date_added INTEGER NOT NULL,
                date_modified INTEGER NOT NULL,
                size INTEGER NOT NULL,
                bucket_id TEXT NOT NULL,
                bucket_name TEXT NOT NULL,
                is_video INTEGER NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                PRIMARY KEY (scope, path)
            );",
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

    fn clear_scope(conn: &Connection, scope: ScanScope) -> Result<(), StoreError> {
        conn.execute(
            "DELETE FROM scan_result_items WHERE group_row IN
                (SELECT id FROM scan_result_groups WHERE scope = ?)",
            [scope.as_str()],
        )?;
        conn.execute("DELETE FROM scan_result_groups WHERE scope = ?", [scope.as_str()])?;
        conn.execute("DELETE FROM scan_result_media WHERE scope = ?", [scope.as_str()])?;
        Ok(())
    }

    /// Replace the stored snapshot for `scope`.
    ///
    /// A full save clears both scopes; a scoped save clears only prior
    /// scoped results. `timestamp` defaults to now.
    pub fn save_scan_results(
        &self,
        groups: &[ScanResultGroup],
        unscannable: &[String],
        scope: ScanScope,
        timestamp: Option<i64>,
    ) -> Result<(), StoreError> {
        let saved_at = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let payload = if unscannable.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(unscannable)
                    .map_err(|e| StoreError::SerializationFailed(e.to_string()))?,
            )
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let cleared: &[ScanScope] = match scope {
            ScanScope::Full => &[ScanScope::Full, ScanScope::Scoped],
            ScanScope::Scoped => &[ScanScope::Scoped],
        };
        for cleared_scope in cleared {
            Self::clear_scope(&tx, *cleared_scope)?;
        }

        for (position, group) in groups.iter().enumerate() {
            let file_size = match group {
                ScanResultGroup::Duplicate(g) => g.file_size as i64,
                ScanResultGroup::Similar(_) => 0,
            };

            tx.execute(
                "INSERT INTO scan_result_groups
                 (scope, group_key, kind, file_size, composition_id, position, saved_at, payload)
                 VALUES (?, ?, ?, ?, ?, ?, ?, NULL)",
                params![
                    scope.as_str(),
                    group.id(),
                    group.kind(),
                    file_size,
                    group.composition_id(),
                    position as i64,
                    saved_at,
                ],
            )?;
            let group_row = tx.last_insert_rowid();

            for (item_position, item) in group.items().iter().enumerate() {
                tx.execute(
                    "INSERT INTO scan_result_items (group_row, position, path) VALUES (?, ?, ?)",
                    params![group_row, item_position as i64, item.id],
                )?;
                Self::insert_media(&tx, scope, item)?;
            }
        }

        if let Some(payload) = payload {
            tx.execute(
                "INSERT INTO scan_result_groups
                 (scope, group_key, kind, file_size, composition_id, position, saved_at, payload)
                 VALUES (?, ?, ?, 0, '', -1, ?, ?)",
                params![
                    scope.as_str(),
                    UNSCANNABLE_GROUP_KEY,
                    KIND_UNSCANNABLE,
                    saved_at,
                    payload,
                ],
            )?;
        }

        tx.commit()?;

        info!(
            "Saved {} groups and {} unscannable files to {} scope",
            groups.len(),
            unscannable.len(),
            scope
        );
        Ok(())
    }

    fn insert_media(conn: &Connection, scope: ScanScope, item: &MediaItem) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO scan_result_media
             (scope, path, uri, display_name, mime_type, date_added, date_modified, size,
              bucket_id, bucket_name, is_video, width, height)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                scope.as_str(),
                item.id,
                item.uri,
                item.display_name,
                item.mime_type,
                item.date_added,
                item.date_modified,
                item.size as i64,
                item.bucket_id,
                item.bucket_name,
                item.is_video,
                item.width,
                item.height,
            ],
        )?;
        Ok(())
    }

    /// Latest results: scoped if any exist, otherwise full.
    pub fn load_latest_scan_results(&self) -> Result<Option<LoadedScanResults>, StoreError> {
        for scope in [ScanScope::Scoped, ScanScope::Full] {
            if let Some(results) = self.load_scope(scope)? {
                return Ok(Some(results));
            }
        }
        Ok(None)
    }

    /// Results stored for one scope; `None` when the scope holds nothing usable.
    ///
    /// Groups left with fewer than two joined items are dropped.
    pub fn load_scope(&self, scope: ScanScope) -> Result<Option<LoadedScanResults>, StoreError> {
        let conn = self.lock()?;

        let mut group_stmt = conn.prepare(
            "SELECT id, group_key, kind, file_size, saved_at, payload
             FROM scan_result_groups WHERE scope = ? ORDER BY position",
        )?;
        let rows = group_stmt
            .query_map([scope.as_str()], |row| {
                Ok(GroupRow {
                    id: row.get(0)?,
                    group_key: row.get(1)?,
                    kind: row.get(2)?,
                    file_size: row.get(3)?,
                    saved_at: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut item_stmt = conn.prepare(
            "SELECT m.path, m.uri, m.display_name, m.mime_type, m.date_added, m.date_modified,
                    m.size, m.bucket_id, m.bucket_name, m.is_video, m.width, m.height
             FROM scan_result_items i
             JOIN scan_result_media m ON m.scope = ?1 AND m.path = i.path
             WHERE i.group_row = ?2
             ORDER BY i.position",
        )?;

        let mut groups = Vec::new();
        let mut unscannable = Vec::new();
        let mut timestamp = i64::MIN;

        for row in rows {
            timestamp = timestamp.max(row.saved_at);

            if row.kind == KIND_UNSCANNABLE {
                let payload = row.payload.as_deref().unwrap_or("[]");
                match serde_json::from_str::<Vec<String>>(payload) {
                    Ok(paths) => unscannable.extend(paths),
                    Err(e) => warn!("Ignoring unreadable unscannable list: {}", e),
                }
                continue;
            }

            let items = item_stmt
                .query_map(params![scope.as_str(), row.id], |r| {
                    Ok(MediaItem {
                        id: r.get(0)?,
                        uri: r.get(1)?,
                        display_name: r.get(2)?,
                        mime_type: r.get(3)?,
                        date_added: r.get(4)?,
                        date_modified: r.get(5)?,
                        size: r.get::<_, i64>(6)? as u64,
                        bucket_id: r.get(7)?,
                        bucket_name: r.get(8)?,
                        is_video: r.get(9)?,
                        width: r.get(10)?,
                        height: r.get(11)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let group = match row.kind.as_str() {
                KIND_DUPLICATE => {
                    ScanResultGroup::duplicate(row.group_key, items, row.file_size as u64)
                }
                KIND_SIMILAR => ScanResultGroup::similar(row.group_key, items),
                other => {
                    warn!("Skipping stored group of unknown kind '{}'", other);
                    None
                }
            };

            match group {
                Some(group) => groups.push(group),
                None => debug!("Dropped stored group {} with fewer than two items", row.id),
            }
        }

        let results = LoadedScanResults {
            groups,
            unscannable,
            timestamp,
            scope,
        };

        Ok(if results.is_empty() { None } else { Some(results) })
    }

    /// Whether a scope has any stored rows
    pub fn has_results(&self, scope: ScanScope) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scan_result_groups WHERE scope = ?",
            [scope.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Drop every stored result in both scopes
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM scan_result_items;
             DELETE FROM scan_result_groups;
             DELETE FROM scan_result_media;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;
    use tempfile::TempDir;

    fn similar(key: &str, paths: &[&str]) -> ScanResultGroup {
        let items = paths
            .iter()
            .enumerate()
            .map(|(i, p)| media_item(p, 1_000 + i as i64, 100, false))
            .collect();
        ScanResultGroup::similar(key.to_string(), items).unwrap()
    }

    fn duplicate(sig: &str, paths: &[&str]) -> ScanResultGroup {
        let items = paths.iter().map(|p| media_item(p, 5, 64, false)).collect();
        ScanResultGroup::duplicate(sig.to_string(), items, 64).unwrap()
    }

    #[test]
    fn round_trip_preserves_groups() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        let groups = vec![
            duplicate("abc123", &["/d1.jpg", "/d2.jpg"]),
            similar("img-00ff00ff00ff00ff", &["/a.jpg", "/b.jpg", "/c.jpg"]),
        ];

        cache
            .save_scan_results(&groups, &["/broken.jpg".to_string()], ScanScope::Full, Some(77))
            .unwrap();

        let loaded = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(loaded.groups, groups);
        assert_eq!(loaded.unscannable, vec!["/broken.jpg"]);
        assert_eq!(loaded.timestamp, 77);
        assert_eq!(loaded.scope, ScanScope::Full);
    }

    #[test]
    fn failed_save_leaves_previous_snapshot_intact() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        let first = vec![
            duplicate("abc123", &["/d1.jpg", "/d2.jpg"]),
            similar("img-first", &["/a.jpg", "/b.jpg"]),
        ];
        cache
            .save_scan_results(&first, &["/broken.jpg".to_string()], ScanScope::Full, Some(10))
            .unwrap();

        // Fail every item insert, after the old snapshot has been cleared
        // and the new group rows written
        cache
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TEMP TRIGGER reject_items BEFORE INSERT ON scan_result_items
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let second = vec![similar("img-second", &["/x.jpg", "/y.jpg"])];
        let result = cache.save_scan_results(&second, &[], ScanScope::Full, Some(20));
        assert!(result.is_err());

        let loaded = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(loaded.groups, first);
        assert_eq!(loaded.unscannable, vec!["/broken.jpg"]);
        assert_eq!(loaded.timestamp, 10);
        assert_eq!(loaded.scope, ScanScope::Full);
        assert!(!cache.has_results(ScanScope::Scoped).unwrap());
    }

    #[test]
    fn scoped_save_keeps_full_results() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        let full = vec![similar("img-full", &["/a.jpg", "/b.jpg"])];
        let scoped = vec![similar("img-scoped", &["/c.jpg", "/d.jpg"])];

        cache.save_scan_results(&full, &[], ScanScope::Full, Some(1)).unwrap();
        cache.save_scan_results(&scoped, &[], ScanScope::Scoped, Some(2)).unwrap();

        let latest = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(latest.scope, ScanScope::Scoped);
        assert_eq!(latest.groups, scoped);

        let fallback = cache.load_scope(ScanScope::Full).unwrap().unwrap();
        assert_eq!(fallback.groups, full);
    }

    #[test]
    fn full_save_clears_both_scopes() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        cache
            .save_scan_results(&[similar("img-s", &["/c", "/d"])], &[], ScanScope::Scoped, None)
            .unwrap();
        cache
            .save_scan_results(&[similar("img-f", &["/a", "/b"])], &[], ScanScope::Full, None)
            .unwrap();

        assert!(!cache.has_results(ScanScope::Scoped).unwrap());
        let latest = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(latest.scope, ScanScope::Full);
        assert_eq!(latest.groups[0].id(), "img-f");
    }

    #[test]
    fn empty_cache_loads_nothing() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        assert!(cache.load_latest_scan_results().unwrap().is_none());
    }

    #[test]
    fn unscannable_only_snapshot_is_usable() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        cache
            .save_scan_results(&[], &["/x.heic".to_string()], ScanScope::Scoped, Some(9))
            .unwrap();

        let loaded = cache.load_latest_scan_results().unwrap().unwrap();
        assert!(loaded.groups.is_empty());
        assert_eq!(loaded.unscannable, vec!["/x.heic"]);
        assert_eq!(loaded.scope, ScanScope::Scoped);
    }

    #[test]
    fn groups_missing_item_metadata_are_dropped() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        cache
            .save_scan_results(&[similar("img-a", &["/a", "/b"])], &[], ScanScope::Full, None)
            .unwrap();

        {
            let conn = cache.lock().unwrap();
            conn.execute("DELETE FROM scan_result_media WHERE path = '/a'", [])
                .unwrap();
        }

        assert!(cache.load_latest_scan_results().unwrap().is_none());
    }

    #[test]
    fn same_representative_hash_can_repeat() {
        let cache = ScanResultCache::open_in_memory().unwrap();
        let groups = vec![
            similar("img-0000000000000000", &["/a", "/b"]),
            similar("img-0000000000000000", &["/c", "/d"]),
        ];

        cache.save_scan_results(&groups, &[], ScanScope::Full, None).unwrap();

        let loaded = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(loaded.groups.len(), 2);
    }

    #[test]
    fn persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("engine.db");
        let groups = vec![similar("img-a", &["/a", "/b"])];

        {
            let cache = ScanResultCache::open(&db_path).unwrap();
            cache.save_scan_results(&groups, &[], ScanScope::Full, Some(5)).unwrap();
        }

        let cache = ScanResultCache::open(&db_path).unwrap();
        let loaded = cache.load_latest_scan_results().unwrap().unwrap();
        assert_eq!(loaded.groups, groups);

        cache.clear().unwrap();
        assert!(cache.load_latest_scan_results().unwrap().is_none());
    }
}
