mod config;
pub mod database;
pub mod memory;

pub use config::{Config, NotificationsConfig, SessionConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::Result;
use crate::session::SessionRecord;

/// Persisted Session Store contract.
///
/// `load` separates "no session was saved" (`Ok(None)`) from a record that
/// exists but cannot be decoded (`Err(CoreError::InvalidRestoredState)`) and
/// from a store that cannot be reached (`Err(CoreError::PersistenceUnavailable)`).
pub trait SessionStore: Send {
    fn save(&self, record: &SessionRecord) -> Result<()>;
    fn load(&self) -> Result<Option<SessionRecord>>;
    fn clear(&self) -> Result<()>;
}

/// Returns `~/.config/attendance[-dev]/` based on ATTENDANCE_ENV.
///
/// Set ATTENDANCE_ENV=dev to use development data directory, or
/// ATTENDANCE_DATA_DIR to point at an explicit directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("ATTENDANCE_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("ATTENDANCE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("attendance-dev")
            } else {
                base_dir.join("attendance")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
