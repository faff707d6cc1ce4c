use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{StopReason, TimerState};

/// Every session transition produces an Event.
/// Hosts print or forward them; the ticker streams them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ClockedIn {
        clock_in_at: DateTime<Utc>,
        cap_secs: u64,
        at: DateTime<Utc>,
    },
    ClockedOut {
        reason: StopReason,
        clock_in_at: Option<DateTime<Utc>>,
        /// Session length at the moment it ended.
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A running session was picked up again after a cold start.
    SessionRestored {
        clock_in_at: DateTime<Utc>,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A coarse-interval write of the running session.
    Persisted {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        clock_in_at: Option<DateTime<Utc>>,
        elapsed_secs: u64,
        formatted: String,
        progress: f64,
        cap_secs: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// True for the event that ends a session.
    pub fn is_clock_out(&self) -> bool {
        matches!(self, Event::ClockedOut { .. })
    }
}
