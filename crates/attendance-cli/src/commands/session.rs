use std::sync::Arc;

use attendance_core::{
    Clock, Config, Database, Event, LifecycleEvent, LogNotifier, NoopNotifier, Notifier,
    SessionTimer, SystemClock, TimerService,
};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Clock in
    Start,
    /// Clock out
    Stop,
    /// Print current session state as JSON
    Status,
    /// Follow the running session until it ends (Ctrl-C to detach)
    Watch,
    /// Reconcile the session as if the app returned to the foreground
    Resume,
    /// Persist the session as if the app moved to the background
    Suspend,
}

fn build_timer(config: &Config) -> Result<SessionTimer, Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Box<dyn Notifier> = if config.notifications.enabled {
        Box::new(LogNotifier::new(Arc::clone(&clock)))
    } else {
        Box::new(NoopNotifier)
    };
    let timer = SessionTimer::new(clock, Database::open()?, notifier)
        .with_settings(config.settings())
        .with_templates(config.templates());
    Ok(timer)
}

fn emit(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut timer = build_timer(&config)?;

    // Every invocation is a fresh process start.
    let restored = timer.restore();
    if let Some(event) = &restored {
        tracing::info!(?event, "restored session");
    }

    match action {
        SessionAction::Start => match timer.start() {
            Some(event) => emit(&event)?,
            None => emit(&timer.snapshot())?,
        },
        SessionAction::Stop => {
            // A session the cap already closed during restore is reported as such.
            let closed = timer
                .stop()
                .or_else(|| restored.filter(Event::is_clock_out));
            match closed {
                Some(event) => emit(&event)?,
                None => emit(&timer.snapshot())?,
            }
        }
        SessionAction::Status => {
            timer.tick();
            emit(&timer.snapshot())?;
        }
        SessionAction::Resume => {
            let mut service = TimerService::new(timer);
            let event = service.handle_lifecycle(LifecycleEvent::Resumed);
            let snapshot = service.lock().snapshot();
            emit(&event.unwrap_or(snapshot))?;
        }
        SessionAction::Suspend => {
            let mut service = TimerService::new(timer);
            let event = service.handle_lifecycle(LifecycleEvent::Suspended);
            let snapshot = service.lock().snapshot();
            emit(&event.unwrap_or(snapshot))?;
        }
        SessionAction::Watch => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(watch(timer))?;
        }
    }
    Ok(())
}

async fn watch(timer: SessionTimer) -> Result<(), Box<dyn std::error::Error>> {
    let mut service = TimerService::new(timer);
    let mut events = service.subscribe();
    service.handle_lifecycle(LifecycleEvent::Resumed);

    if !service.is_ticking() {
        let snapshot = service.lock().snapshot();
        emit(&snapshot)?;
        eprintln!("no active session");
        return Ok(());
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(Event::StateSnapshot { formatted, progress, .. }) => {
                    println!("{formatted}  {:>5.1}%", progress * 100.0);
                }
                Some(event) if event.is_clock_out() => {
                    emit(&event)?;
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                service.handle_lifecycle(LifecycleEvent::Suspended);
                eprintln!("detached, session keeps running");
                break;
            }
        }
    }
    Ok(())
}
