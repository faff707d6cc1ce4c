use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{NotificationRequest, Notifier};
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
struct Inbox {
    pending: Vec<NotificationRequest>,
    delivered: Vec<NotificationRequest>,
    history: Vec<NotificationRequest>,
    failing: bool,
}

/// In-process scheduler that records every request.
///
/// Clones share state, so a test keeps one handle while the timer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    inbox: Arc<Mutex<Inbox>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject every subsequent `schedule_at`.
    pub fn set_failing(&self, failing: bool) {
        self.inbox().failing = failing;
    }

    /// Requests scheduled and not yet delivered or cancelled.
    pub fn pending(&self) -> Vec<NotificationRequest> {
        self.inbox().pending.clone()
    }

    /// Every request ever accepted, in order.
    pub fn history(&self) -> Vec<NotificationRequest> {
        self.inbox().history.clone()
    }

    pub fn history_for(&self, id: &str) -> Vec<NotificationRequest> {
        self.inbox()
            .history
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }

    pub fn delivered(&self) -> Vec<NotificationRequest> {
        self.inbox().delivered.clone()
    }

    /// Move requests due at or before `now` from pending to delivered.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Vec<NotificationRequest> {
        let mut inbox = self.inbox();
        let (due, still_pending): (Vec<_>, Vec<_>) = inbox
            .pending
            .drain(..)
            .partition(|r| r.fires_at <= now);
        inbox.pending = still_pending;
        inbox.delivered.extend(due.iter().cloned());
        due
    }
}

impl Notifier for MemoryNotifier {
    fn schedule_at(&self, request: NotificationRequest) -> Result<()> {
        let mut inbox = self.inbox();
        if inbox.failing {
            return Err(CoreError::NotificationSchedulingFailed {
                id: request.id,
                message: "scheduler rejected request".into(),
            });
        }
        inbox.pending.retain(|r| r.id != request.id);
        inbox.history.push(request.clone());
        inbox.pending.push(request);
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<()> {
        self.inbox().pending.retain(|r| r.id != id);
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        self.inbox().pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(id: &str, fires_at: DateTime<Utc>) -> NotificationRequest {
        NotificationRequest {
            id: id.into(),
            fires_at,
            title: "t".into(),
            body: "b".into(),
        }
    }

    #[test]
    fn same_id_replaces_pending_request() {
        let notifier = MemoryNotifier::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        notifier.schedule_at(request("a", at)).unwrap();
        notifier
            .schedule_at(request("a", at + Duration::hours(1)))
            .unwrap();
        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(notifier.pending()[0].fires_at, at + Duration::hours(1));
        assert_eq!(notifier.history_for("a").len(), 2);
    }

    #[test]
    fn deliver_due_only_moves_past_requests() {
        let notifier = MemoryNotifier::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        notifier.schedule_at(request("now", at)).unwrap();
        notifier
            .schedule_at(request("later", at + Duration::hours(4)))
            .unwrap();
        let due = notifier.deliver_due(at);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "now");
        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(notifier.delivered().len(), 1);
    }

    #[test]
    fn cancel_removes_only_matching_id() {
        let notifier = MemoryNotifier::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        notifier.schedule_at(request("a", at)).unwrap();
        notifier.schedule_at(request("b", at)).unwrap();
        notifier.cancel("a").unwrap();
        assert_eq!(notifier.pending().len(), 1);
        notifier.cancel_all().unwrap();
        assert!(notifier.pending().is_empty());
    }

    #[test]
    fn failing_scheduler_reports_request_id() {
        let notifier = MemoryNotifier::new();
        notifier.set_failing(true);
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        match notifier.schedule_at(request("x", at)) {
            Err(CoreError::NotificationSchedulingFailed { id, .. }) => assert_eq!(id, "x"),
            other => panic!("Expected NotificationSchedulingFailed, got {other:?}"),
        }
        assert!(notifier.history().is_empty());
    }
}
