//! Notification scheduler contract.
//!
//! The timer schedules one future "cap reached" alert per session and fires a
//! "clocked out" confirmation when the session ends. Delivery is best-effort;
//! the timer logs scheduler failures and carries on.

mod memory;
mod terminal;

pub use memory::MemoryNotifier;
pub use terminal::LogNotifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CAP_NOTIFICATION_ID: &str = "attendance.cap-reached";
pub const CLOCKED_OUT_NOTIFICATION_ID: &str = "attendance.clocked-out";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: String,
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Scheduling an id that is already pending replaces the pending request.
pub trait Notifier: Send {
    fn schedule_at(&self, request: NotificationRequest) -> Result<()>;
    fn cancel(&self, id: &str) -> Result<()>;
    fn cancel_all(&self) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn schedule_at(&self, request: NotificationRequest) -> Result<()> {
        (**self).schedule_at(request)
    }

    fn cancel(&self, id: &str) -> Result<()> {
        (**self).cancel(id)
    }

    fn cancel_all(&self) -> Result<()> {
        (**self).cancel_all()
    }
}

/// Notifier for hosts with notifications switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn schedule_at(&self, _request: NotificationRequest) -> Result<()> {
        Ok(())
    }

    fn cancel(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Titles and bodies of the alerts the timer sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplates {
    pub cap_title: String,
    pub cap_body: String,
    pub clocked_out_title: String,
    pub clocked_out_body: String,
    pub cap_reached_body: String,
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        crate::storage::Config::default().templates()
    }
}
