//! SQLite-backed checkpoint store implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::store::{CheckpointError, CheckpointKey, CheckpointStore};

/// SQLite-backed checkpoint store.
///
/// A single connection behind a mutex serializes writes, which also
/// satisfies the per-key serialization requirement.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path).map_err(|e| CheckpointError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CheckpointError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CheckpointError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CheckpointError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                company_id TEXT NOT NULL,
                accountant_id TEXT NOT NULL,
                period_key TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (company_id, accountant_id, period_key, entity_id)
            );
            "#,
        )
        .map_err(|e| CheckpointError::Database(e.to_string()))?;

        Ok(())
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<HashSet<String>, CheckpointError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT entity_id FROM checkpoints
                 WHERE company_id = ? AND accountant_id = ? AND period_key = ?",
            )
            .map_err(|e| CheckpointError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![key.company_id, key.accountant_id, key.period_key],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| CheckpointError::Database(e.to_string()))?;

        let mut entities = HashSet::new();
        for row in rows {
            entities.insert(row.map_err(|e| CheckpointError::Database(e.to_string()))?);
        }
        Ok(entities)
    }

    fn append(&self, key: &CheckpointKey, entity_id: &str) -> Result<(), CheckpointError> {
        let conn = self.conn.lock().unwrap();

        // INSERT OR IGNORE makes re-appending an already-present id a no-op.
        conn.execute(
            "INSERT OR IGNORE INTO checkpoints
             (company_id, accountant_id, period_key, entity_id, completed_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                key.company_id,
                key.accountant_id,
                key.period_key,
                entity_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| CheckpointError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(period: &str) -> CheckpointKey {
        CheckpointKey::new("empresa-1", "12345678900", period)
    }

    #[test]
    fn test_load_empty_key() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let entities = store.load(&key("01012024_31012024")).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_append_and_load() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let k = key("01012024_31012024");
        store.append(&k, "101").unwrap();
        store.append(&k, "102").unwrap();

        let entities = store.load(&k).unwrap();
        assert_eq!(entities.len(), 2);
        assert!(entities.contains("101"));
        assert!(entities.contains("102"));
    }

    #[test]
    fn test_append_is_idempotent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let k = key("01012024_31012024");
        store.append(&k, "101").unwrap();
        store.append(&k, "101").unwrap();
        store.append(&k, "101").unwrap();

        let entities = store.load(&k).unwrap();
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let january = key("01012024_31012024");
        let february = key("01022024_29022024");
        store.append(&january, "101").unwrap();

        assert!(store.load(&january).unwrap().contains("101"));
        assert!(store.load(&february).unwrap().is_empty());

        let other_company =
            CheckpointKey::new("empresa-2", "12345678900", "01012024_31012024");
        assert!(store.load(&other_company).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_connections() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("checkpoints.db");
        let k = key("01012024_31012024");

        {
            let store = SqliteCheckpointStore::new(&db_path).unwrap();
            store.append(&k, "101").unwrap();
        }

        let store = SqliteCheckpointStore::new(&db_path).unwrap();
        assert!(store.load(&k).unwrap().contains("101"));
    }
}
