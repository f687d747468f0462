//! Feeder core: the control loop.
//!
//! [`FeederCore`] owns the actuator controller, the sensor reader, the
//! schedule table and every port.  Each tick it collects triggers from the
//! button, the schedule and the remote command channel into one queue and
//! dispatches them in the order they were observed.  A remote message that
//! arrived between ticks goes ahead of a button press seen at the tick.  It is the only code that runs the servo or
//! reads the sensors, and it runs on one thread.
//!
//! ```text
//!   ButtonPort ──┐
//! ScheduleTable ─┼──▶ TriggerQueue ──▶ dispatch ──▶ ActuatorController
//! CommandChannel ┘    (FIFO, bound)       │
//!                                         ├──▶ SensorReader
//!                                         └──▶ StatusReporter, EventSink
//! ```
//!
//! ## No-overlap policy
//!
//! Every trigger carries the uptime it was observed at.  A feed trigger
//! observed before the most recent feed finished is dropped and logged:
//! it was raised while the servo was busy (remote messages that arrived
//! mid-feed, or triggers queued behind a feed in the same tick).  After a
//! feed the button is re-armed so a press made during the feed is reported
//! as dropped instead of becoming an edge on the next tick.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::channels::CommandReceiver;
use crate::config::FeederConfig;
use crate::control::actuator::{ActuationState, ActuatorController, FeedOutcome};
use crate::error::Error;
use crate::events::{TRIGGER_QUEUE_CAP, Trigger, TriggerAction, TriggerQueue, TriggerSource};
use crate::scheduler::ScheduleTable;
use crate::sensors::SensorReader;

use super::commands::{self, FeedCommand};
use super::events::{
    DishImage, DropReason, FeederEvent, FillLevel, SnapshotKind, StatusSnapshot, TickFault,
};
use super::ports::{
    ButtonPort, CameraPort, Clock, DistancePort, EventSink, ServoPort, StatusReporter,
};

// ───────────────────────────────────────────────────────────────
// Ports bundle
// ───────────────────────────────────────────────────────────────

/// Everything the core drives.  `None` marks an absent capability.
pub struct FeederPorts {
    pub servo: Option<Box<dyn ServoPort>>,
    /// Blocks for the servo hold time.
    pub delay: Box<dyn DelayNs>,
    pub button: Option<Box<dyn ButtonPort>>,
    pub distance: Option<Box<dyn DistancePort>>,
    pub camera: Option<Box<dyn CameraPort>>,
    pub reporter: Box<dyn StatusReporter>,
    pub sink: Box<dyn EventSink>,
}

// ───────────────────────────────────────────────────────────────
// Statistics
// ───────────────────────────────────────────────────────────────

/// Counters kept across the life of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Ticks whose processing (servo hold time excluded) exceeded the budget.
    pub overruns: u64,
    /// Longest tick processing time seen, servo hold time excluded.
    pub worst_tick: Duration,
    pub feeds_completed: u64,
    pub feeds_failed: u64,
    pub dropped_triggers: u64,
    pub rejected_commands: u64,
    /// Ticks that returned an error or panicked.
    pub faults: u64,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub triggers: usize,
    pub feeds: usize,
    pub dropped: usize,
    /// Time spent inside [`ActuatorController::run`].
    pub actuator_time: Duration,
}

// ───────────────────────────────────────────────────────────────
// FeederCore
// ───────────────────────────────────────────────────────────────

pub struct FeederCore {
    actuator: ActuatorController,
    sensors: SensorReader,
    button: Option<Box<dyn ButtonPort>>,
    reporter: Box<dyn StatusReporter>,
    sink: Box<dyn EventSink>,
    clock: Arc<dyn Clock>,
    commands: CommandReceiver,
    schedule: ScheduleTable,
    queue: TriggerQueue,
    feed_duration: Duration,
    tick_interval: Duration,
    max_tick: Duration,
    /// Uptime at which the most recent feed episode ended.
    last_feed_finished: Option<Duration>,
    stats: TickStats,
}

impl FeederCore {
    /// Build the core with the default schedule from `config`.
    ///
    /// Does **not** emit the start event; call [`start`](Self::start) or
    /// [`run`](Self::run) next.
    pub fn new(
        config: &FeederConfig,
        ports: FeederPorts,
        clock: Arc<dyn Clock>,
        commands: CommandReceiver,
    ) -> Self {
        let schedule = ScheduleTable::from_config(config, clock.uptime());
        let FeederPorts { servo, delay, button, distance, camera, reporter, sink } = ports;

        Self {
            actuator: ActuatorController::new(servo, delay),
            sensors: SensorReader::new(config, distance, camera),
            button,
            reporter,
            sink,
            clock,
            commands,
            schedule,
            queue: TriggerQueue::new(),
            feed_duration: config.feed_duration(),
            tick_interval: config.tick_interval(),
            max_tick: config.max_tick(),
            last_feed_finished: None,
            stats: TickStats::default(),
        }
    }

    /// Replace the schedule table.
    pub fn with_schedule(mut self, schedule: ScheduleTable) -> Self {
        self.schedule = schedule;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self) {
        self.sink.emit(&FeederEvent::Started {
            servo: self.actuator.has_servo(),
            button: self.button.is_some(),
            distance: self.sensors.has_distance(),
        });
        info!(
            "FeederCore started: {} schedule entries, tick {} ms",
            self.schedule.active_count(),
            self.tick_interval.as_millis()
        );
    }

    /// Fixed-cadence loop.  Returns once `shutdown` is set; an actuation in
    /// progress always finishes its release first.
    pub fn run(&mut self, shutdown: &AtomicBool) -> TickStats {
        self.start();

        while !shutdown.load(Ordering::Relaxed) {
            let began = self.clock.uptime();
            self.guarded_tick();
            let spent = self.clock.uptime().saturating_sub(began);
            if let Some(rest) = self.tick_interval.checked_sub(spent) {
                thread::sleep(rest);
            }
        }

        if let Err(e) = self.actuator.force_neutral() {
            error!("FeederCore: servo release at shutdown failed: {}", e);
        }
        info!("FeederCore stopped: {:?}", self.stats);
        self.stats
    }

    /// One tick, with errors and panics contained.  Used by [`run`](Self::run).
    pub fn guarded_tick(&mut self) {
        let began = self.clock.uptime();
        self.stats.ticks += 1;

        let outcome = catch_unwind(AssertUnwindSafe(|| self.tick()));
        let elapsed = self.clock.uptime().saturating_sub(began);

        match outcome {
            Ok(Ok(report)) => self.account(elapsed.saturating_sub(report.actuator_time)),
            Ok(Err(e)) => {
                self.stats.faults += 1;
                self.sink.emit(&FeederEvent::TickFault(TickFault::Error(e)));
            }
            Err(payload) => {
                self.stats.faults += 1;
                let msg = panic_message(payload.as_ref());
                self.sink.emit(&FeederEvent::TickFault(TickFault::Panic(msg)));
                self.queue.clear();
                if let Err(e) = self.actuator.force_neutral() {
                    error!("FeederCore: servo release after panic failed: {}", e);
                }
            }
        }
    }

    fn account(&mut self, processing: Duration) {
        if processing > self.stats.worst_tick {
            self.stats.worst_tick = processing;
        }
        if processing > self.max_tick {
            self.stats.overruns += 1;
            self.sink.emit(&FeederEvent::TickOverrun {
                elapsed: processing,
                budget: self.max_tick,
            });
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Collect this tick's triggers and dispatch them in arrival order.
    ///
    /// A failure to return the servo to neutral is reported as the tick's
    /// error after the rest of the queue has been processed.
    pub fn tick(&mut self) -> Result<TickReport, Error> {
        let now = self.clock.uptime();
        let mut report = TickReport::default();

        // 1. Button edge
        if let Some(button) = self.button.as_deref_mut() {
            if button.poll_pressed_edge() {
                info!("Button pressed");
                let trigger = Trigger {
                    source: TriggerSource::Button,
                    action: TriggerAction::Feed { duration: self.feed_duration },
                    observed_at: now,
                };
                self.enqueue(trigger, &mut report);
            }
        }

        // 2. Due schedule entries
        let local = self.clock.local_now();
        for due in self.schedule.due_entries(local, now) {
            let trigger = Trigger {
                source: TriggerSource::Schedule(due.label),
                action: due.action,
                observed_at: now,
            };
            self.enqueue(trigger, &mut report);
        }

        // 3. Remote commands, bounded per tick
        for _ in 0..TRIGGER_QUEUE_CAP {
            let Some(raw) = self.commands.try_next() else { break };
            match commands::decode(&raw.frame) {
                Ok(cmd) => {
                    info!("Remote command: {:?}", cmd);
                    let trigger = Trigger {
                        source: TriggerSource::Remote,
                        action: TriggerAction::from_command(cmd, self.feed_duration),
                        observed_at: raw.received_at,
                    };
                    self.enqueue(trigger, &mut report);
                }
                Err(e) => {
                    self.stats.rejected_commands += 1;
                    self.sink.emit(&FeederEvent::CommandRejected(e));
                }
            }
        }

        // 4. Dispatch
        let mut fault = None;
        while let Some(trigger) = self.queue.pop() {
            report.triggers += 1;
            if let Err(e) = self.dispatch(trigger, &mut report) {
                fault.get_or_insert(e);
            }
        }

        match fault {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Queue a remote command directly, bypassing the channel.
    pub fn handle_command(&mut self, cmd: FeedCommand) {
        let trigger = Trigger {
            source: TriggerSource::Remote,
            action: TriggerAction::from_command(cmd, self.feed_duration),
            observed_at: self.clock.uptime(),
        };
        let mut report = TickReport::default();
        self.enqueue(trigger, &mut report);
    }

    fn enqueue(&mut self, trigger: Trigger, report: &mut TickReport) {
        if let Err(t) = self.queue.push(trigger) {
            self.drop_trigger(t.source, DropReason::QueueFull, report);
        }
    }

    fn drop_trigger(&mut self, source: TriggerSource, reason: DropReason, report: &mut TickReport) {
        report.dropped += 1;
        self.stats.dropped_triggers += 1;
        self.sink.emit(&FeederEvent::TriggerDropped { source, reason });
    }

    fn dispatch(&mut self, trigger: Trigger, report: &mut TickReport) -> Result<(), Error> {
        match trigger.action {
            TriggerAction::Feed { duration } => self.feed(trigger, duration, report),
            TriggerAction::RequestImage => {
                let dish = self.sensors.dish_level();
                let hopper = FillLevel::Unknown;
                self.publish(SnapshotKind::Image, &trigger, hopper, dish.level, dish.image);
                Ok(())
            }
            TriggerAction::ReportStatus => {
                let hopper = self.sensors.hopper_level();
                let dish = self.sensors.dish_level().level;
                self.publish(SnapshotKind::Periodic, &trigger, hopper, dish, None);
                Ok(())
            }
        }
    }

    fn feed(
        &mut self,
        trigger: Trigger,
        duration: Duration,
        report: &mut TickReport,
    ) -> Result<(), Error> {
        let source = trigger.source;
        if self.last_feed_finished.is_some_and(|end| trigger.observed_at < end) {
            self.drop_trigger(source, DropReason::FeedInProgress, report);
            return Ok(());
        }

        self.sink.emit(&FeederEvent::FeedStarted { source, duration });
        let began = self.clock.uptime();
        let result = self.actuator.run(duration);
        let finished = self.clock.uptime();
        report.actuator_time += finished.saturating_sub(began);
        self.last_feed_finished = Some(finished);

        if let Some(button) = self.button.as_deref_mut() {
            if button.rearm() {
                self.drop_trigger(TriggerSource::Button, DropReason::FeedInProgress, report);
            }
        }

        match result {
            Ok(FeedOutcome::Completed { duration }) => {
                report.feeds += 1;
                self.stats.feeds_completed += 1;
                self.sink.emit(&FeederEvent::FeedCompleted { source, duration });
                let hopper = self.sensors.hopper_level();
                let dish = self.sensors.dish_level().level;
                self.publish(SnapshotKind::Fill, &trigger, hopper, dish, None);
                Ok(())
            }
            Ok(FeedOutcome::Skipped) => {
                self.sink.emit(&FeederEvent::FeedSkipped { source });
                Ok(())
            }
            Err(e) => {
                self.stats.feeds_failed += 1;
                self.sink.emit(&FeederEvent::FeedFailed { source, error: e });
                self.actuator.force_neutral().map_err(Error::from)
            }
        }
    }

    fn publish(
        &mut self,
        kind: SnapshotKind,
        trigger: &Trigger,
        hopper: FillLevel,
        dish: FillLevel,
        image: Option<DishImage>,
    ) {
        let snapshot = StatusSnapshot {
            kind,
            taken_at: self.clock.utc_now(),
            triggered_at: self.wall_time_of(trigger.observed_at),
            hopper,
            dish,
        };
        self.sink.emit(&FeederEvent::StatusQueued(snapshot.clone()));
        self.reporter.report(snapshot, image);
    }

    /// Wall-clock time of a past uptime reading.
    fn wall_time_of(&self, uptime: Duration) -> DateTime<Utc> {
        let ago = self.clock.uptime().saturating_sub(uptime);
        let now = self.clock.utc_now();
        TimeDelta::from_std(ago).map_or(now, |d| now - d)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn actuation_state(&self) -> ActuationState {
        self.actuator.state()
    }

    pub fn schedule_mut(&mut self) -> &mut ScheduleTable {
        &mut self.schedule
    }

    pub fn pending_triggers(&self) -> usize {
        self.queue.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
