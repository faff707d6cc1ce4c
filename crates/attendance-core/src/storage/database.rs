//! SQLite-backed session store.
//!
//! Provides persistent storage for:
//! - The current attendance session record
//! - Key-value store for other host state

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, SessionStore};
use crate::error::{CoreError, DatabaseError, Result};
use crate::session::SessionRecord;

/// kv key holding the encoded [`SessionRecord`].
pub const SESSION_KEY: &str = "attendance_session";

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/attendance/attendance.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("attendance.db"))
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn unavailable(err: rusqlite::Error) -> CoreError {
    CoreError::PersistenceUnavailable(DatabaseError::from(err).to_string())
}

impl SessionStore for Database {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.kv_set(SESSION_KEY, &json).map_err(unavailable)
    }

    fn load(&self) -> Result<Option<SessionRecord>> {
        let Some(json) = self.kv_get(SESSION_KEY).map_err(unavailable)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| CoreError::InvalidRestoredState(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        self.kv_delete(SESSION_KEY).map_err(unavailable)
    }
}
