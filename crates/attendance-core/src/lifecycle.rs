//! Foreground/background reconciliation.
//!
//! Stateless orchestration over [`SessionTimer`], driven by process lifecycle
//! notifications from the host.

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::timer::SessionTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// The process regained foreground execution.
    Resumed,
    /// The process is about to be suspended.
    Suspended,
}

/// Recompute elapsed time after a suspension; closes the session if the
/// cap passed while the process was not running.
pub fn on_resume(timer: &mut SessionTimer) -> Option<Event> {
    if !timer.is_running() {
        return None;
    }
    tracing::debug!("reconciling session after resume");
    timer.tick()
}

/// Write the running session immediately so a cold start has minimal drift.
pub fn on_suspend(timer: &mut SessionTimer) -> Option<Event> {
    if !timer.is_running() {
        return None;
    }
    timer.persist_now()
}

pub fn handle(event: LifecycleEvent, timer: &mut SessionTimer) -> Option<Event> {
    match event {
        LifecycleEvent::Resumed => on_resume(timer),
        LifecycleEvent::Suspended => on_suspend(timer),
    }
}
