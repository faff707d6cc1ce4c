//! Integration tests for the session timer across simulated process restarts.

use std::sync::Arc;

use attendance_core::notify::{CAP_NOTIFICATION_ID, CLOCKED_OUT_NOTIFICATION_ID};
use attendance_core::session::DEFAULT_CAP_SECS;
use attendance_core::{
    Database, Event, LifecycleEvent, ManualClock, MemoryNotifier, MemoryStore, SessionRecord,
    SessionStore, SessionTimer, StopReason, TimerService, TimerSettings, TimerState,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
}

fn new_timer(
    clock: &Arc<ManualClock>,
    store: &MemoryStore,
    notifier: &MemoryNotifier,
) -> SessionTimer {
    SessionTimer::new(clock.clone(), store.clone(), notifier.clone())
}

#[test]
fn test_double_start_keeps_first_clock_in() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    let mut timer = new_timer(&clock, &store, &notifier);

    timer.start();
    clock.advance(Duration::seconds(30));
    timer.start();

    assert_eq!(timer.clock_in_at(), Some(at(9, 0, 0)));
    assert_eq!(
        store.load().unwrap().and_then(|r| r.clock_in_at),
        Some(at(9, 0, 0))
    );
}

#[test]
fn test_stop_on_stopped_timer_is_noop() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    let mut timer = new_timer(&clock, &store, &notifier);

    assert!(timer.stop().is_none());
    timer.start();
    assert!(timer.stop().is_some());
    assert!(timer.stop().is_none());
    assert_eq!(notifier.history_for(CLOCKED_OUT_NOTIFICATION_ID).len(), 1);
}

#[test]
fn test_cap_enforced_by_tick() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    let mut timer = new_timer(&clock, &store, &notifier);

    timer.start();
    clock.advance(Duration::hours(5));
    timer.tick();

    assert_eq!(timer.state(), TimerState::Stopped);
    assert_eq!(timer.elapsed_secs(), DEFAULT_CAP_SECS);
}

#[test]
fn test_cap_enforced_by_restore() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    store
        .save(&SessionRecord::running(at(9, 0, 0) - Duration::hours(5), 120))
        .unwrap();

    let mut timer = new_timer(&clock, &store, &notifier);
    let event = timer.restore();

    assert!(matches!(
        event,
        Some(Event::ClockedOut {
            reason: StopReason::CapReached,
            elapsed_secs: DEFAULT_CAP_SECS,
            ..
        })
    ));
    assert_eq!(timer.state(), TimerState::Stopped);
    assert_eq!(timer.elapsed_secs(), DEFAULT_CAP_SECS);
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_lowered_cap_closes_checkpointed_session_on_restore() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    store
        .save(&SessionRecord::running(at(9, 0, 0), 3_600))
        .unwrap();

    clock.set(at(11, 0, 0));
    let mut timer = new_timer(&clock, &store, &notifier).with_settings(TimerSettings {
        cap_secs: 1_800,
        ..TimerSettings::default()
    });
    let event = timer.restore();

    assert!(matches!(
        event,
        Some(Event::ClockedOut {
            reason: StopReason::CapReached,
            elapsed_secs: 1_800,
            ..
        })
    ));
    assert_eq!(timer.state(), TimerState::Stopped);
    assert_eq!(timer.elapsed_secs(), 1_800);
    assert_eq!(notifier.history_for(CLOCKED_OUT_NOTIFICATION_ID).len(), 1);
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_restore_matches_uninterrupted_session() {
    let delta = Duration::minutes(97) + Duration::seconds(13);

    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    {
        let mut timer = new_timer(&clock, &store, &notifier);
        timer.start();
        clock.advance(Duration::seconds(61));
        timer.tick();
        // process dies here
    }
    clock.set(at(9, 0, 0) + delta);
    let mut restored = new_timer(&clock, &store, &notifier);
    assert!(matches!(
        restored.restore(),
        Some(Event::SessionRestored { .. })
    ));

    let control_clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let mut control = new_timer(&control_clock, &MemoryStore::new(), &MemoryNotifier::new());
    control.start();
    control_clock.set(at(9, 0, 0) + delta);
    control.tick();

    assert_eq!(restored.elapsed_secs(), control.elapsed_secs());
    assert_eq!(restored.clock_in_at(), Some(at(9, 0, 0)));
    assert!(restored.is_running());
    assert_eq!(
        store.load().unwrap(),
        Some(SessionRecord::running(at(9, 0, 0), restored.elapsed_secs()))
    );
}

#[test]
fn test_restore_keeps_single_pending_cap_alert() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    new_timer(&clock, &store, &notifier).start();

    clock.advance(Duration::hours(1));
    new_timer(&clock, &store, &notifier).restore();

    let pending: Vec<_> = notifier
        .pending()
        .into_iter()
        .filter(|r| r.id == CAP_NOTIFICATION_ID)
        .collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fires_at, at(13, 0, 0));
}

#[test]
fn test_sqlite_round_trip() {
    let db = Database::open_memory().unwrap();
    let record = SessionRecord::running(at(9, 0, 0), 3_599);
    db.save(&record).unwrap();
    assert_eq!(db.load().unwrap(), Some(record));
}

#[test]
fn test_scenario_clock_in_tick_clock_out() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    let mut timer = new_timer(&clock, &store, &notifier);

    timer.start();
    clock.set(at(9, 0, 1));
    timer.tick();
    assert_eq!(timer.elapsed_secs(), 1);

    clock.set(at(9, 30, 0));
    timer.stop();
    assert_eq!(timer.elapsed_secs(), 0);
    assert!(!timer.is_running());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_scenario_restore_after_cap_fires_once() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    new_timer(&clock, &store, &notifier).start();

    clock.set(at(13, 0, 1));
    let mut timer = new_timer(&clock, &store, &notifier);
    timer.restore();

    assert_eq!(timer.state(), TimerState::Stopped);
    assert_eq!(timer.elapsed_secs(), 14_400);
    assert_eq!(notifier.history_for(CLOCKED_OUT_NOTIFICATION_ID).len(), 1);
    assert!(notifier
        .pending()
        .iter()
        .all(|r| r.id != CAP_NOTIFICATION_ID));

    // A second process start finds nothing to restore.
    let mut again = new_timer(&clock, &store, &notifier);
    assert!(again.restore().is_none());
    assert_eq!(notifier.history_for(CLOCKED_OUT_NOTIFICATION_ID).len(), 1);
}

#[test]
fn test_corrupt_record_restores_stopped() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    store.put_raw("{\"isRunning\":true,\"clockInTimestamp\":\"yesterday\"}");

    let mut timer = new_timer(&clock, &store, &notifier);
    assert!(timer.restore().is_none());
    assert_eq!(timer.state(), TimerState::Stopped);
    assert!(store.raw().is_none());
}

#[test]
fn test_unknown_schema_version_restores_stopped() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    store.put_raw(
        "{\"version\":7,\"is_running\":true,\"clock_in_at\":\"2024-03-04T08:00:00Z\",\"elapsed_secs\":0}",
    );

    let mut timer = new_timer(&clock, &store, &notifier);
    assert!(timer.restore().is_none());
    assert!(!timer.is_running());
}

#[test]
fn test_unavailable_store_restores_stopped() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    store.save(&SessionRecord::running(at(8, 0, 0), 0)).unwrap();
    store.set_unavailable(true);

    let mut timer = new_timer(&clock, &store, &notifier);
    assert!(timer.restore().is_none());
    assert!(!timer.is_running());
}

#[test]
fn test_suspend_then_cold_start_has_no_drift() {
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let store = MemoryStore::new();
    let notifier = MemoryNotifier::new();
    let mut service = TimerService::new(new_timer(&clock, &store, &notifier));
    service.start();

    clock.advance(Duration::seconds(42));
    service.handle_lifecycle(LifecycleEvent::Suspended);
    assert_eq!(store.load().unwrap().unwrap().elapsed_secs, 42);
    drop(service);

    clock.advance(Duration::seconds(18));
    let mut service = TimerService::new(new_timer(&clock, &store, &notifier));
    service.restore();
    assert_eq!(service.lock().elapsed_secs(), 60);
}

#[test]
fn test_file_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attendance.db");
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let notifier = MemoryNotifier::new();

    let mut first = SessionTimer::new(
        clock.clone(),
        Database::open_at(&path).unwrap(),
        notifier.clone(),
    );
    first.start();
    drop(first);

    clock.set(at(10, 15, 0));
    let mut second = SessionTimer::new(
        clock.clone(),
        Database::open_at(&path).unwrap(),
        notifier.clone(),
    );
    second.restore();
    assert!(second.is_running());
    assert_eq!(second.elapsed_secs(), 75 * 60);
}

proptest! {
    #[test]
    fn prop_elapsed_is_monotonic_and_capped(steps in prop::collection::vec(0i64..3_000, 1..40)) {
        let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
        let mut timer = new_timer(&clock, &MemoryStore::new(), &MemoryNotifier::new());
        timer.start();

        let mut previous = 0;
        for step in steps {
            clock.advance(Duration::seconds(step));
            timer.tick();
            prop_assert!(timer.elapsed_secs() <= DEFAULT_CAP_SECS);
            if !timer.is_running() {
                prop_assert_eq!(timer.elapsed_secs(), DEFAULT_CAP_SECS);
                break;
            }
            prop_assert!(timer.elapsed_secs() >= previous);
            previous = timer.elapsed_secs();
        }
    }

    #[test]
    fn prop_restore_equals_wall_clock(gap in 0i64..14_400) {
        let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
        let store = MemoryStore::new();
        let notifier = MemoryNotifier::new();
        new_timer(&clock, &store, &notifier).start();

        clock.advance(Duration::seconds(gap));
        let mut timer = new_timer(&clock, &store, &notifier);
        timer.restore();
        prop_assert!(timer.is_running());
        prop_assert_eq!(timer.elapsed_secs(), gap as u64);
    }
}
