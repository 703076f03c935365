// packages/tracker/src/session/store.rs
//! Persistent key-value stores for the session record
//!
//! The identity manager only needs `get`/`set`/`remove` on string keys. Any
//! error from a store is treated as "persistence unavailable" by callers.

use crate::utils::errors::{Result, TrackerError};
use crate::utils::now_millis;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Key holding the current session id
pub const SESSION_ID_KEY: &str = "session_tracker.session_id";

/// Key holding the last-activity timestamp (ms since epoch)
pub const LAST_ACTIVITY_KEY: &str = "session_tracker.last_activity";

/// Key holding the session start timestamp (ms since epoch)
pub const STARTED_AT_KEY: &str = "session_tracker.started_at";

/// Durable string key-value store
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store; survives tracker instances but not restarts
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// SQLite-backed store; survives process restarts
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::StoreUnavailable(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!("Session store journal mode: {}", journal);

        let store = Self::with_connection(conn)?;
        info!("Session store opened at {:?}", path);
        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl SessionStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let value = db
            .query_row(
                "SELECT value FROM session_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            r#"
            INSERT INTO session_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, now_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        let removed = db.execute("DELETE FROM session_store WHERE key = ?", params![key])?;
        debug!("Removed {} row(s) for {}", removed, key);
        Ok(())
    }
}
