//! Session data model.
//!
//! A single [`SessionRecord`] describes whether the user is clocked in and
//! for how long. It is the unit the store persists, tagged with a schema
//! version so an unreadable old format is distinguishable from "no session".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Current on-disk schema of [`SessionRecord`].
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum continuous session length (4 hours).
pub const DEFAULT_CAP_SECS: u64 = 4 * 60 * 60;

/// Coarse persistence interval while running.
pub const DEFAULT_PERSIST_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Stopped,
    Running,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user clocked out.
    Manual,
    /// The session hit the cap, live or while the process was not running.
    CapReached,
}

/// Persisted form of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub is_running: bool,
    pub clock_in_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
}

impl SessionRecord {
    /// Record for a session that is currently clocked in.
    pub fn running(clock_in_at: DateTime<Utc>, elapsed_secs: u64) -> Self {
        Self {
            version: SCHEMA_VERSION,
            is_running: true,
            clock_in_at: Some(clock_in_at),
            elapsed_secs,
        }
    }

    pub fn stopped() -> Self {
        Self {
            version: SCHEMA_VERSION,
            is_running: false,
            clock_in_at: None,
            elapsed_secs: 0,
        }
    }

    /// Check the record is one this build can restore from.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidRestoredState`] for an unknown schema
    /// version or a running record without a clock-in time. The stored
    /// `elapsed_secs` is only a cache and is not checked; restore recomputes
    /// it from `clock_in_at`.
    pub fn validate(&self) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            return Err(CoreError::InvalidRestoredState(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                self.version
            )));
        }
        if self.is_running && self.clock_in_at.is_none() {
            return Err(CoreError::InvalidRestoredState(
                "running session has no clock-in time".into(),
            ));
        }
        Ok(())
    }
}

/// Format seconds as `HH:MM:SS`.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
