//! Background ticker for the session timer.
//!
//! [`TimerService`] owns the shared timer and the handle of the tokio task
//! that ticks it. Stopping the session aborts the task; a cap stop observed by
//! the task ends it. The task only holds a `Weak` reference, so it can never
//! keep a disposed timer alive or tick it after the service is gone.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SessionTimer;
use crate::events::Event;
use crate::lifecycle::{self, LifecycleEvent};

/// The single exclusive-mutation owner of a session.
pub type SharedTimer = Arc<Mutex<SessionTimer>>;

fn lock(timer: &Mutex<SessionTimer>) -> MutexGuard<'_, SessionTimer> {
    timer.lock().unwrap_or_else(|e| e.into_inner())
}

/// Session timer plus the task that ticks it.
///
/// Ticking requires a Tokio runtime. Without one, the service still performs
/// every transition and the host must call `tick` itself.
pub struct TimerService {
    timer: SharedTimer,
    ticker: Option<JoinHandle<()>>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl TimerService {
    pub fn new(timer: SessionTimer) -> Self {
        Self {
            timer: Arc::new(Mutex::new(timer)),
            ticker: None,
            events: None,
        }
    }

    /// Receive every event the ticker produces plus a snapshot per tick.
    ///
    /// Only affects tickers spawned after the call.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn timer(&self) -> SharedTimer {
        Arc::clone(&self.timer)
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionTimer> {
        lock(&self.timer)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start(&mut self) -> Option<Event> {
        let event = self.lock().start();
        self.sync_ticker();
        event
    }

    pub fn stop(&mut self) -> Option<Event> {
        self.cancel_ticker();
        self.lock().stop()
    }

    pub fn restore(&mut self) -> Option<Event> {
        let event = self.lock().restore();
        self.sync_ticker();
        event
    }

    pub fn tick(&mut self) -> Option<Event> {
        let event = self.lock().tick();
        self.sync_ticker();
        event
    }

    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Option<Event> {
        let result = lifecycle::handle(event, &mut self.lock());
        self.sync_ticker();
        result
    }

    /// Ticker runs exactly while the session does.
    fn sync_ticker(&mut self) {
        if self.lock().is_running() {
            self.ensure_ticker();
        } else {
            self.cancel_ticker();
        }
    }

    fn ensure_ticker(&mut self) {
        if self.is_ticking() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("no tokio runtime, session will not tick automatically");
            return;
        }
        let period = self.lock().settings().tick_interval;
        self.ticker = Some(spawn_ticker(
            Arc::downgrade(&self.timer),
            period,
            self.events.clone(),
        ));
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

fn spawn_ticker(
    timer: Weak<Mutex<SessionTimer>>,
    period: Duration,
    events: Option<mpsc::UnboundedSender<Event>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        tracing::debug!(?period, "ticker started");

        loop {
            interval.tick().await;
            let Some(timer) = timer.upgrade() else {
                break;
            };
            let (event, snapshot, running) = {
                let mut guard = lock(&timer);
                let event = guard.tick();
                (event, guard.snapshot(), guard.is_running())
            };

            if let Some(tx) = &events {
                if let Some(event) = event {
                    let _ = tx.send(event);
                }
                let _ = tx.send(snapshot);
            }
            if !running {
                break;
            }
        }
        tracing::debug!("ticker stopped");
    })
}
