//! In-process session store.
//!
//! Holds the encoded record in memory. Clones share one slot, so a test can
//! drop an engine ("kill the process") and hand the same store to a new one.

use std::sync::{Arc, Mutex, MutexGuard};

use super::SessionStore;
use crate::error::{CoreError, Result};
use crate::session::SessionRecord;

#[derive(Debug, Default)]
struct Slot {
    raw: Option<String>,
    unavailable: bool,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrite the stored bytes, bypassing encoding.
    pub fn put_raw(&self, raw: impl Into<String>) {
        self.slot().raw = Some(raw.into());
    }

    pub fn raw(&self) -> Option<String> {
        self.slot().raw.clone()
    }

    /// Make every subsequent operation fail with `PersistenceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.slot().unavailable = unavailable;
    }

    /// Number of successful `save` calls.
    pub fn write_count(&self) -> usize {
        self.slot().writes
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut slot = self.slot();
        if slot.unavailable {
            return Err(CoreError::PersistenceUnavailable("memory store offline".into()));
        }
        slot.raw = Some(json);
        slot.writes += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionRecord>> {
        let slot = self.slot();
        if slot.unavailable {
            return Err(CoreError::PersistenceUnavailable("memory store offline".into()));
        }
        match slot.raw.as_deref() {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| CoreError::InvalidRestoredState(e.to_string())),
        }
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot();
        if slot.unavailable {
            return Err(CoreError::PersistenceUnavailable("memory store offline".into()));
        }
        slot.raw = None;
        Ok(())
    }
}
