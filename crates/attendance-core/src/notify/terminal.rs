use std::sync::Arc;

use super::{NotificationRequest, Notifier};
use crate::clock::Clock;
use crate::error::Result;

/// Notifier for terminal hosts.
///
/// Requests that are already due are printed to stderr; future ones are only
/// logged, since a short-lived process cannot deliver them later.
pub struct LogNotifier {
    clock: Arc<dyn Clock>,
}

impl LogNotifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Notifier for LogNotifier {
    fn schedule_at(&self, request: NotificationRequest) -> Result<()> {
        if request.fires_at <= self.clock.now() {
            eprintln!("[{}] {}", request.title, request.body);
        } else {
            tracing::info!(
                id = %request.id,
                fires_at = %request.fires_at,
                "notification scheduled"
            );
        }
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<()> {
        tracing::info!(id, "notification cancelled");
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        tracing::info!("all notifications cancelled");
        Ok(())
    }
}
