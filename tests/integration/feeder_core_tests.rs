//! Integration tests: FeederCore with mock hardware.
//!
//! Each test wires a [`Rig`] (real `ButtonDriver`, `ScheduleTable`, command
//! channel and actuator controller over mock ports) and drives it tick by
//! tick on a manual clock.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use petfeeder::app::commands::FeedCommand;
use petfeeder::app::events::{DropReason, FeederEvent, FillLevel, SnapshotKind, TickFault};
use petfeeder::control::actuator::ActuationState;
use petfeeder::events::{TriggerAction, TriggerSource};
use petfeeder::scheduler::{ScheduleEntry, ScheduleTable};

use crate::mock_hw::{Rig, RigOptions, ServoCall, at};

const FEED: &[u8] = br#"{"command":"feed"}"#;

fn dropped(source: TriggerSource) -> impl Fn(&FeederEvent) -> bool {
    move |e| {
        matches!(
            e,
            FeederEvent::TriggerDropped { source: s, reason: DropReason::FeedInProgress } if *s == source
        )
    }
}

fn shade_of(png: &[u8]) -> u8 {
    image::load_from_memory(png).unwrap().to_rgb8().get_pixel(0, 0).0[0]
}

// ── Button feeds ──────────────────────────────────────────────

#[test]
fn button_press_feeds_and_reports_fill() {
    let mut rig = Rig::quiet();

    rig.button.set(true);
    rig.tick();

    assert_eq!(rig.servo.borrow().calls, vec![ServoCall::Engage, ServoCall::Release]);
    assert!(!rig.servo.borrow().engaged);
    assert_eq!(rig.core.actuation_state(), ActuationState::Idle);
    assert_eq!(rig.core.stats().feeds_completed, 1);

    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 1);
    let (snapshot, image) = &reports[0];
    assert_eq!(snapshot.kind, SnapshotKind::Fill);
    assert_eq!(snapshot.hopper, FillLevel::Known(50));
    assert_eq!(snapshot.dish, FillLevel::Unknown);
    assert!(image.is_none());
    assert!(snapshot.triggered_at < snapshot.taken_at);

    assert_eq!(
        rig.count_events(|e| matches!(
            e,
            FeederEvent::FeedCompleted { source: TriggerSource::Button, .. }
        )),
        1
    );
}

#[test]
fn held_button_feeds_once() {
    let mut rig = Rig::quiet();

    rig.button.set(true);
    for _ in 0..10 {
        rig.tick();
    }
    assert_eq!(rig.engage_count(), 1);

    rig.button.set(false);
    rig.tick();
    rig.button.set(true);
    rig.tick();
    assert_eq!(rig.engage_count(), 2);
}

#[test]
fn press_during_feed_is_dropped_and_next_press_honoured() {
    let mut rig = Rig::quiet();

    let button = rig.button.clone();
    rig.during_next_feed(move || button.set(true));
    rig.inbox.deliver(FEED);
    rig.tick();

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(rig.count_events(dropped(TriggerSource::Button)), 1);
    assert_eq!(rig.core.stats().dropped_triggers, 1);

    // Still held: no edge.
    rig.tick();
    assert_eq!(rig.engage_count(), 1);

    rig.button.set(false);
    rig.tick();
    rig.button.set(true);
    rig.tick();
    assert_eq!(rig.engage_count(), 2);
    assert!(!rig.servo.borrow().overlapped);
}

// ── Remote commands ───────────────────────────────────────────

#[test]
fn remote_feed_during_feed_is_dropped() {
    let mut rig = Rig::quiet();

    let inbox = rig.inbox.clone();
    rig.during_next_feed(move || {
        inbox.deliver(FEED);
    });
    rig.button.set(true);
    rig.tick();
    rig.tick();

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(rig.count_events(dropped(TriggerSource::Remote)), 1);
    assert_eq!(rig.reports.borrow().len(), 1);
}

#[test]
fn remote_feed_after_feed_is_honoured() {
    let mut rig = Rig::quiet();

    rig.button.set(true);
    rig.tick();
    rig.inbox.deliver(FEED);
    rig.tick();

    assert_eq!(rig.engage_count(), 2);
    assert_eq!(rig.core.stats().dropped_triggers, 0);
}

#[test]
fn second_feed_in_the_same_tick_is_dropped() {
    let mut rig = Rig::quiet();

    rig.inbox.deliver(FEED);
    rig.inbox.deliver(FEED);
    rig.tick();

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(rig.core.stats().feeds_completed, 1);
    assert_eq!(rig.count_events(dropped(TriggerSource::Remote)), 1);
    assert!(!rig.servo.borrow().overlapped);
}

#[test]
fn remote_feed_received_before_a_press_goes_first() {
    let mut rig = Rig::quiet();

    rig.inbox.deliver(FEED);
    rig.clock.advance(Duration::from_millis(300));
    rig.button.set(true);
    rig.tick();

    let started: Vec<_> = rig
        .events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            FeederEvent::FeedStarted { source, .. } => Some(*source),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![TriggerSource::Remote]);
    assert_eq!(rig.count_events(dropped(TriggerSource::Button)), 1);
    assert_eq!(rig.engage_count(), 1);
}

#[test]
fn remote_duration_override_is_used() {
    let mut rig = Rig::quiet();

    rig.inbox.deliver(br#"{"command":"feed","duration_secs":3}"#);
    rig.tick();

    assert_eq!(
        rig.count_events(|e| matches!(
            e,
            FeederEvent::FeedCompleted { source: TriggerSource::Remote, duration }
                if *duration == Duration::from_secs(3)
        )),
        1
    );
}

#[test]
fn malformed_commands_are_rejected_without_side_effects() {
    let mut rig = Rig::quiet();

    rig.inbox.deliver(b"garbage");
    rig.inbox.deliver(br#"{"command":"dance"}"#);
    rig.inbox.deliver(br#"{"command":"feed","duration_secs":0}"#);
    rig.tick();

    assert_eq!(rig.core.stats().rejected_commands, 3);
    assert_eq!(rig.count_events(|e| matches!(e, FeederEvent::CommandRejected(_))), 3);
    assert_eq!(rig.engage_count(), 0);
    assert!(rig.reports.borrow().is_empty());
    assert_eq!(rig.core.actuation_state(), ActuationState::Idle);
}

#[test]
fn handle_command_queues_for_the_next_tick() {
    let mut rig = Rig::quiet();

    rig.core.handle_command(FeedCommand::Feed { duration: None });
    assert_eq!(rig.core.pending_triggers(), 1);
    assert_eq!(rig.engage_count(), 0);

    rig.tick();
    assert_eq!(rig.core.pending_triggers(), 0);
    assert_eq!(rig.engage_count(), 1);
}

#[test]
fn image_request_uploads_picture_without_feeding() {
    let mut rig = Rig::with(RigOptions { camera: true, ..RigOptions::default() });

    rig.inbox.deliver(br#"{"command":"image"}"#);
    rig.tick();

    assert_eq!(rig.engage_count(), 0);
    // Reference picture first, then the comparison picture.
    assert_eq!(rig.captures.get(), 2);

    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 1);
    let (snapshot, image) = &reports[0];
    assert_eq!(snapshot.kind, SnapshotKind::Image);
    assert_eq!(snapshot.hopper, FillLevel::Unknown);
    // Same picture as the reference: a full dish.
    assert_eq!(snapshot.dish, FillLevel::Known(100));
    let image = image.as_ref().unwrap();
    assert_eq!(image.file_name, "compare.png");
    assert_eq!(shade_of(&image.bytes), 128);
}

#[test]
fn queued_image_keeps_its_picture_after_the_next_capture() {
    let mut rig = Rig::with(RigOptions {
        camera: true,
        schedule: Some(ScheduleTable::new(Duration::ZERO)),
        ..RigOptions::default()
    });

    rig.camera_shade.set(60);
    rig.inbox.deliver(br#"{"command":"image"}"#);
    rig.tick();

    // The feed's fill report captures over the same file.
    rig.camera_shade.set(120);
    rig.inbox.deliver(FEED);
    rig.tick();

    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0.kind, SnapshotKind::Image);
    assert_eq!(reports[1].0.kind, SnapshotKind::Fill);
    assert_eq!(shade_of(&reports[0].1.as_ref().unwrap().bytes), 60);
    let on_disk = std::fs::read(rig.dir.path().join("compare.png")).unwrap();
    assert_eq!(shade_of(&on_disk), 120);
}

// ── Schedule ──────────────────────────────────────────────────

#[test]
fn daily_feed_fires_once_across_many_ticks() {
    let mut rig = Rig::with(RigOptions { start: at(7, 59, 50), ..RigOptions::default() });

    for _ in 0..60 {
        rig.tick();
    }

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(
        rig.count_events(|e| matches!(
            e,
            FeederEvent::FeedStarted { source: TriggerSource::Schedule("daily-feed"), .. }
        )),
        1
    );
}

#[test]
fn daily_feed_does_not_fire_for_a_time_already_past_at_startup() {
    let mut rig = Rig::with(RigOptions { start: at(8, 5, 0), ..RigOptions::default() });

    for _ in 0..10 {
        rig.tick();
    }
    assert_eq!(rig.engage_count(), 0);
}

#[test]
fn periodic_status_takes_fresh_readings() {
    let mut table = ScheduleTable::new(Duration::ZERO);
    table.add(ScheduleEntry::every(
        "status-report",
        Duration::from_secs(10),
        TriggerAction::ReportStatus,
    ));
    let mut rig = Rig::with(RigOptions { schedule: Some(table), ..RigOptions::default() });

    for _ in 0..21 {
        rig.tick();
    }
    assert_eq!(rig.reports.borrow().len(), 1);

    rig.distance.set(2.0);
    for _ in 0..20 {
        rig.tick();
    }

    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0.kind, SnapshotKind::Periodic);
    assert_eq!(reports[0].0.hopper, FillLevel::Known(50));
    assert_eq!(reports[1].0.hopper, FillLevel::Known(100));
    assert!(reports.iter().all(|(_, image)| image.is_none()));
    assert_eq!(rig.engage_count(), 0);
}

#[test]
fn disabled_entry_does_not_fire() {
    let mut table = ScheduleTable::new(Duration::ZERO);
    let id = table.add(ScheduleEntry::every(
        "status-report",
        Duration::from_secs(1),
        TriggerAction::ReportStatus,
    ));
    let mut rig = Rig::with(RigOptions { schedule: Some(table), ..RigOptions::default() });

    assert!(rig.core.schedule_mut().set_enabled(id, false));
    for _ in 0..10 {
        rig.tick();
    }
    assert!(rig.reports.borrow().is_empty());
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn engage_failure_leaves_servo_released() {
    let mut rig = Rig::quiet();
    rig.servo.borrow_mut().fail_engage = true;

    rig.button.set(true);
    rig.tick();

    let servo = rig.servo.borrow();
    assert!(!servo.engaged);
    assert_eq!(servo.calls.last(), Some(&ServoCall::Release));
    drop(servo);

    assert_eq!(rig.core.stats().feeds_failed, 1);
    assert_eq!(rig.core.stats().feeds_completed, 0);
    assert_eq!(rig.count_events(|e| matches!(e, FeederEvent::FeedFailed { .. })), 1);
    assert!(rig.reports.borrow().is_empty());
    assert_eq!(rig.core.actuation_state(), ActuationState::Idle);
}

#[test]
fn panic_in_a_tick_is_contained() {
    let mut rig = Rig::quiet();
    rig.servo.borrow_mut().panic_on_engage = true;

    rig.button.set(true);
    rig.tick();

    assert!(!rig.servo.borrow().engaged);
    assert_eq!(rig.core.stats().faults, 1);
    assert_eq!(rig.core.actuation_state(), ActuationState::Idle);
    assert_eq!(
        rig.count_events(|e| matches!(e, FeederEvent::TickFault(TickFault::Panic(_)))),
        1
    );

    // The loop keeps working.
    rig.servo.borrow_mut().panic_on_engage = false;
    rig.button.set(false);
    rig.tick();
    rig.button.set(true);
    rig.tick();
    assert_eq!(rig.core.stats().feeds_completed, 1);
    assert!(!rig.servo.borrow().engaged);
}

#[test]
fn missing_servo_skips_feeds() {
    let mut rig = Rig::with(RigOptions {
        servo: false,
        schedule: Some(ScheduleTable::new(Duration::ZERO)),
        ..RigOptions::default()
    });

    rig.button.set(true);
    rig.tick();

    assert_eq!(rig.count_events(|e| matches!(e, FeederEvent::FeedSkipped { .. })), 1);
    assert_eq!(rig.core.stats().feeds_completed, 0);
    assert!(rig.reports.borrow().is_empty());
    assert!(rig.servo.borrow().calls.is_empty());
}

// ── Timing ────────────────────────────────────────────────────

#[test]
fn servo_hold_does_not_count_as_overrun() {
    let mut rig = Rig::quiet();

    rig.button.set(true);
    rig.tick();

    assert_eq!(rig.core.stats().feeds_completed, 1);
    assert_eq!(rig.core.stats().overruns, 0);
}

#[test]
fn slow_camera_is_reported_as_overrun() {
    let mut rig = Rig::with(RigOptions {
        camera: true,
        schedule: Some(ScheduleTable::new(Duration::ZERO)),
        ..RigOptions::default()
    });
    rig.camera_lag.set(Duration::from_secs(2));

    rig.inbox.deliver(br#"{"command":"image"}"#);
    rig.tick();

    let stats = rig.core.stats();
    assert_eq!(stats.overruns, 1);
    assert!(stats.worst_tick >= Duration::from_secs(4));
    assert_eq!(rig.count_events(|e| matches!(e, FeederEvent::TickOverrun { .. })), 1);
}

#[test]
fn run_returns_on_shutdown_with_servo_released() {
    let mut rig = Rig::quiet();

    let shutdown = AtomicBool::new(true);
    let stats = rig.core.run(&shutdown);

    assert_eq!(stats.ticks, 0);
    assert_eq!(rig.servo.borrow().calls, vec![ServoCall::Release]);
    assert!(rig.count_events(|e| matches!(e, FeederEvent::Started { servo: true, .. })) >= 1);
}
