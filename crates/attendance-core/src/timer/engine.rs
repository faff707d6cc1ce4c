//! Session timer engine.
//!
//! The session timer is a wall-clock-based state machine. It does not use
//! internal threads - the caller (or [`super::TimerService`]) is responsible
//! for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running -> Stopped (manual or cap)
//! ```
//!
//! Elapsed time is always `now - clock_in_at`, clamped to the cap. Ticks only
//! refresh the cached value, so a missed tick or a dead process never causes
//! drift, and the cap cannot be escaped by killing and relaunching the host.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = SessionTimer::new(clock, store, notifier);
//! timer.restore(); // once per process start
//! timer.start();
//! // In a loop:
//! timer.tick(); // Returns Some(Event::ClockedOut) when the cap is reached
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::events::Event;
use crate::notify::{
    NotificationRequest, NotificationTemplates, Notifier, CAP_NOTIFICATION_ID,
    CLOCKED_OUT_NOTIFICATION_ID,
};
use crate::session::{
    format_hms, SessionRecord, StopReason, TimerState, DEFAULT_CAP_SECS,
    DEFAULT_PERSIST_INTERVAL_SECS, DEFAULT_TICK_INTERVAL_MS,
};
use crate::storage::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Session force-closes once elapsed reaches this many seconds.
    pub cap_secs: u64,
    /// Running sessions are written at least this often (in elapsed seconds).
    pub persist_interval_secs: u64,
    pub tick_interval: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            cap_secs: DEFAULT_CAP_SECS,
            persist_interval_secs: DEFAULT_PERSIST_INTERVAL_SECS,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

/// Attendance session timer for one signed-in user.
///
/// Store and notifier calls are best-effort: failures are logged and never
/// change the outcome of a transition. In-memory state is authoritative for
/// the lifetime of the process.
pub struct SessionTimer {
    clock: Arc<dyn Clock>,
    store: Box<dyn SessionStore>,
    notifier: Box<dyn Notifier>,
    templates: NotificationTemplates,
    settings: TimerSettings,
    state: TimerState,
    clock_in_at: Option<DateTime<Utc>>,
    elapsed_secs: u64,
    /// Elapsed value at the last successful write.
    last_persisted_secs: u64,
}

impl SessionTimer {
    /// Create a stopped timer with default settings and notification texts.
    pub fn new(
        clock: Arc<dyn Clock>,
        store: impl SessionStore + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            clock,
            store: Box::new(store),
            notifier: Box::new(notifier),
            templates: NotificationTemplates::default(),
            settings: TimerSettings::default(),
            state: TimerState::Stopped,
            clock_in_at: None,
            elapsed_secs: 0,
            last_persisted_secs: 0,
        }
    }

    pub fn with_settings(mut self, settings: TimerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_templates(mut self, templates: NotificationTemplates) -> Self {
        self.templates = templates;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn clock_in_at(&self) -> Option<DateTime<Utc>> {
        self.clock_in_at
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn cap_secs(&self) -> u64 {
        self.settings.cap_secs
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    /// Elapsed time as `HH:MM:SS`.
    pub fn formatted_elapsed(&self) -> String {
        format_hms(self.elapsed_secs)
    }

    /// 0.0 .. 1.0 progress towards the cap.
    pub fn progress_fraction(&self) -> f64 {
        if self.settings.cap_secs == 0 {
            return 0.0;
        }
        (self.elapsed_secs as f64 / self.settings.cap_secs as f64).clamp(0.0, 1.0)
    }

    /// The record the store should hold for the current state.
    pub fn record(&self) -> SessionRecord {
        match (self.state, self.clock_in_at) {
            (TimerState::Running, Some(at)) => SessionRecord::running(at, self.elapsed_secs),
            _ => SessionRecord::stopped(),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            clock_in_at: self.clock_in_at,
            elapsed_secs: self.elapsed_secs,
            formatted: self.formatted_elapsed(),
            progress: self.progress_fraction(),
            cap_secs: self.settings.cap_secs,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Clock in. No-op while a session is already running.
    pub fn start(&mut self) -> Option<Event> {
        if self.is_running() {
            tracing::debug!("start ignored, session already running");
            return None;
        }

        let now = self.clock.now();
        self.state = TimerState::Running;
        self.clock_in_at = Some(now);
        self.elapsed_secs = 0;
        self.last_persisted_secs = 0;
        self.persist();
        self.schedule_cap_notification(now);

        tracing::info!(clock_in_at = %now, cap_secs = self.settings.cap_secs, "clocked in");
        Some(Event::ClockedIn {
            clock_in_at: now,
            cap_secs: self.settings.cap_secs,
            at: now,
        })
    }

    /// Call periodically. Returns `Some(Event::ClockedOut)` when the cap is
    /// reached and `Some(Event::Persisted)` on a coarse-interval write.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }

        let now = self.clock.now();
        self.refresh_elapsed(now);
        if self.elapsed_secs >= self.settings.cap_secs {
            return Some(self.finish(StopReason::CapReached, now));
        }

        let since_write = self.elapsed_secs.saturating_sub(self.last_persisted_secs);
        if since_write >= self.settings.persist_interval_secs && self.persist() {
            tracing::debug!(elapsed_secs = self.elapsed_secs, "session checkpointed");
            return Some(Event::Persisted {
                elapsed_secs: self.elapsed_secs,
                at: now,
            });
        }
        None
    }

    /// Clock out. Idempotent: a stopped timer is left untouched.
    ///
    /// A session that has already run past the cap (for example because no
    /// tick happened since) is closed through the cap path instead.
    pub fn stop(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }

        let now = self.clock.now();
        self.refresh_elapsed(now);
        let reason = if self.elapsed_secs >= self.settings.cap_secs {
            StopReason::CapReached
        } else {
            StopReason::Manual
        };
        Some(self.finish(reason, now))
    }

    /// Rehydrate from the store. Call once at process start.
    ///
    /// An unreadable store or record leaves the timer stopped. A running
    /// record resumes with elapsed time recomputed from the wall clock; if the
    /// gap already exceeds the cap the session is closed via the cap path.
    pub fn restore(&mut self) -> Option<Event> {
        if self.is_running() {
            tracing::debug!("restore on a running timer, reconciling instead");
            return self.tick();
        }

        let record = match self.store.load() {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(CoreError::InvalidRestoredState(reason)) => {
                self.discard_invalid(&reason);
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read session store, starting stopped");
                return None;
            }
        };

        if let Err(e) = record.validate() {
            self.discard_invalid(&e.to_string());
            return None;
        }
        let (true, Some(clock_in_at)) = (record.is_running, record.clock_in_at) else {
            return None;
        };

        let now = self.clock.now();
        self.state = TimerState::Running;
        self.clock_in_at = Some(clock_in_at);
        self.last_persisted_secs = record.elapsed_secs;
        self.refresh_elapsed(now);

        if self.elapsed_secs >= self.settings.cap_secs {
            tracing::info!(%clock_in_at, "restored session already past the cap");
            return Some(self.finish(StopReason::CapReached, now));
        }

        self.persist();
        self.schedule_cap_notification(clock_in_at);
        tracing::info!(%clock_in_at, elapsed_secs = self.elapsed_secs, "session restored");
        Some(Event::SessionRestored {
            clock_in_at,
            elapsed_secs: self.elapsed_secs,
            at: now,
        })
    }

    /// Write the running session now, regardless of the coarse interval.
    pub fn persist_now(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        let now = self.clock.now();
        self.refresh_elapsed(now);
        self.persist().then(|| Event::Persisted {
            elapsed_secs: self.elapsed_secs,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn refresh_elapsed(&mut self, now: DateTime<Utc>) {
        if let Some(clock_in_at) = self.clock_in_at {
            let secs = (now - clock_in_at).num_seconds().max(0) as u64;
            self.elapsed_secs = secs.min(self.settings.cap_secs);
        }
    }

    /// Shared tail of manual and cap stops.
    fn finish(&mut self, reason: StopReason, now: DateTime<Utc>) -> Event {
        let clock_in_at = self.clock_in_at.take();
        let final_elapsed = match reason {
            StopReason::Manual => self.elapsed_secs,
            StopReason::CapReached => self.settings.cap_secs,
        };

        self.state = TimerState::Stopped;
        self.last_persisted_secs = 0;
        // A cap stop keeps the frozen cap value visible; a manual stop resets.
        self.elapsed_secs = match reason {
            StopReason::Manual => 0,
            StopReason::CapReached => self.settings.cap_secs,
        };

        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
        if let Err(e) = self.notifier.cancel(CAP_NOTIFICATION_ID) {
            tracing::warn!(error = %e, "failed to cancel cap notification");
        }
        let body = match reason {
            StopReason::Manual => self.templates.clocked_out_body.clone(),
            StopReason::CapReached => self.templates.cap_reached_body.clone(),
        };
        self.notify(NotificationRequest {
            id: CLOCKED_OUT_NOTIFICATION_ID.into(),
            fires_at: now,
            title: self.templates.clocked_out_title.clone(),
            body,
        });

        tracing::info!(?reason, elapsed_secs = final_elapsed, "clocked out");
        Event::ClockedOut {
            reason,
            clock_in_at,
            elapsed_secs: final_elapsed,
            at: now,
        }
    }

    /// Returns whether the write succeeded.
    fn persist(&mut self) -> bool {
        match self.store.save(&self.record()) {
            Ok(()) => {
                self.last_persisted_secs = self.elapsed_secs;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist session");
                false
            }
        }
    }

    fn schedule_cap_notification(&self, clock_in_at: DateTime<Utc>) {
        let fires_at = i64::try_from(self.settings.cap_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|cap| clock_in_at.checked_add_signed(cap))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.notify(NotificationRequest {
            id: CAP_NOTIFICATION_ID.into(),
            fires_at,
            title: self.templates.cap_title.clone(),
            body: self.templates.cap_body.clone(),
        });
    }

    fn notify(&self, request: NotificationRequest) {
        if let Err(e) = self.notifier.schedule_at(request) {
            tracing::warn!(error = %e, "notification not scheduled");
        }
    }

    fn discard_invalid(&mut self, reason: &str) {
        tracing::warn!(reason, "discarding unreadable session record");
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear unreadable session record");
        }
    }
}
