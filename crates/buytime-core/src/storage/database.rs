//! SQLite-backed key/value store.
//!
//! Two files live under the data directory:
//! - `shared/ledger.db`: the Shared Ledger Store, opened by every
//!   execution context (foreground app, monitor, overlay)
//! - `app.db`: foreground-only cache (confirmed remote values, preferences)
//!
//! Both use WAL mode and a busy timeout so that concurrent processes wait
//! for each other instead of failing outright.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection};

use super::{data_dir, KeyValueStore};
use crate::error::{CoreError, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding a single `kv` table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the shared ledger store at `<data_dir>/shared/ledger.db`.
    ///
    /// # Errors
    /// Returns an error if the directory or database cannot be created.
    pub fn open_shared() -> Result<Self, CoreError> {
        let dir = data_dir()?.join("shared");
        std::fs::create_dir_all(&dir)?;
        Ok(Self::open_at(&dir.join("ledger.db"))?)
    }

    /// Open the foreground-only cache at `<data_dir>/app.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_local() -> Result<Self, CoreError> {
        let path = data_dir()?.join("app.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (and create if missing) a store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns a row, so it can't go through execute_batch.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Locked)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Locked)?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Locked)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Locked)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
