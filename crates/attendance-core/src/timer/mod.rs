mod engine;
mod ticker;

pub use engine::{SessionTimer, TimerSettings};
pub use ticker::{SharedTimer, TimerService};
