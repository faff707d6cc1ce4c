//! # Attendance Core Library
//!
//! This library provides the clock-in/clock-out session timer used by the
//! attendance tracker. Hosts (the CLI, or a UI shell) construct one
//! [`SessionTimer`] per signed-in user and deliver user intents and process
//! lifecycle events to it.
//!
//! ## Architecture
//!
//! - **Session Timer**: A wall-clock-based state machine. Elapsed time is always
//!   derived from `now - clock_in_at`, never accumulated from ticks
//! - **Ticker**: A cancellable tokio interval task that drives `tick()`
//! - **Lifecycle**: Resume/suspend reconciliation over the timer
//! - **Storage**: SQLite kv persistence of the session record and TOML configuration
//! - **Notifications**: Scheduler contract for the cap-reached and clocked-out alerts
//!
//! ## Key Components
//!
//! - [`SessionTimer`]: Core timer state machine
//! - [`TimerService`]: Timer plus its background ticker
//! - [`SessionStore`]: Persisted session store contract
//! - [`Notifier`]: Notification scheduler contract
//! - [`Clock`]: Injectable time source

pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod notify;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use lifecycle::LifecycleEvent;
pub use notify::{
    LogNotifier, MemoryNotifier, NoopNotifier, NotificationRequest, NotificationTemplates, Notifier,
};
pub use session::{SessionRecord, StopReason, TimerState};
pub use storage::{Config, Database, MemoryStore, SessionStore};
pub use timer::{SessionTimer, SharedTimer, TimerService, TimerSettings};
