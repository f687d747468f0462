//! Mock hardware and a ready-wired [`Rig`] for integration tests.
//!
//! Every mock records what was asked of it so tests can assert on the full
//! call history without touching GPIO, processes or the network.  Time is
//! a [`ManualClock`] that only moves when a test (or the servo hold)
//! advances it.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};
use image::{Rgb, RgbImage};

use petfeeder::app::events::{DishImage, FeederEvent, StatusSnapshot};
use petfeeder::app::ports::{
    CameraPort, Clock, DistancePort, EventSink, ServoPort, StatusReporter,
};
use petfeeder::app::service::{FeederCore, FeederPorts};
use petfeeder::channels::{CommandInbox, command_channel};
use petfeeder::config::FeederConfig;
use petfeeder::drivers::button::ButtonDriver;
use petfeeder::error::{ActuatorError, SensorError};
use petfeeder::scheduler::ScheduleTable;

// ── Clock ─────────────────────────────────────────────────────

pub struct ManualClock {
    uptime_ms: AtomicU64,
    base: NaiveDateTime,
}

impl ManualClock {
    pub fn starting_at(base: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self { uptime_ms: AtomicU64::new(0), base })
    }

    pub fn advance(&self, d: Duration) {
        self.uptime_ms.fetch_add(d.as_millis() as u64, Ordering::SeqCst);
    }

    fn elapsed(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.uptime_ms.load(Ordering::SeqCst) as i64)
    }
}

impl Clock for ManualClock {
    fn uptime(&self) -> Duration {
        Duration::from_millis(self.uptime_ms.load(Ordering::SeqCst))
    }

    fn local_now(&self) -> NaiveDateTime {
        self.base + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.base.and_utc() + self.elapsed()
    }
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

// ── Servo ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoCall {
    Engage,
    Release,
}

#[derive(Default)]
pub struct ServoState {
    pub calls: Vec<ServoCall>,
    pub engaged: bool,
    /// Set if `engage` was called while already engaged.
    pub overlapped: bool,
    pub fail_engage: bool,
    pub panic_on_engage: bool,
}

pub struct MockServo(pub Rc<RefCell<ServoState>>);

impl ServoPort for MockServo {
    fn engage(&mut self) -> Result<(), ActuatorError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(ServoCall::Engage);
        if s.engaged {
            s.overlapped = true;
        }
        s.engaged = true;
        if s.panic_on_engage {
            drop(s);
            panic!("servo driver fault");
        }
        if s.fail_engage { Err(ActuatorError::PwmWriteFailed) } else { Ok(()) }
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(ServoCall::Release);
        s.engaged = false;
        Ok(())
    }
}

// ── Delay (servo hold) ────────────────────────────────────────

/// Hooks run once, halfway through the next servo hold.
pub type DuringFeed = Rc<RefCell<Vec<Box<dyn FnOnce()>>>>;

pub struct MockDelay {
    pub clock: Arc<ManualClock>,
    pub during_feed: DuringFeed,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        let half = Duration::from_millis(u64::from(ms) / 2);
        self.clock.advance(half);
        let hooks: Vec<_> = self.during_feed.borrow_mut().drain(..).collect();
        for hook in hooks {
            hook();
        }
        self.clock.advance(Duration::from_millis(u64::from(ms)) - half);
    }
}

// ── Button pin ────────────────────────────────────────────────

/// `true` = pressed (pin pulled low).
pub struct MockPin(pub Rc<Cell<bool>>);

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }
}

// ── Sensors ───────────────────────────────────────────────────

pub struct MockDistance(pub Rc<Cell<f32>>);

impl DistancePort for MockDistance {
    fn distance_cm(&mut self) -> Result<f32, SensorError> {
        Ok(self.0.get())
    }
}

/// Writes a solid picture of the current `shade` on every capture, after
/// advancing the clock by `lag` to simulate a slow camera.
pub struct MockCamera {
    pub clock: Arc<ManualClock>,
    pub lag: Rc<Cell<Duration>>,
    pub shade: Rc<Cell<u8>>,
    pub captures: Rc<Cell<usize>>,
}

impl CameraPort for MockCamera {
    fn capture(&mut self, path: &Path, _timeout: Duration) -> Result<(), SensorError> {
        self.clock.advance(self.lag.get());
        self.captures.set(self.captures.get() + 1);
        RgbImage::from_pixel(4, 4, Rgb([self.shade.get(); 3]))
            .save(path)
            .map_err(|_| SensorError::CaptureFailed)
    }
}

// ── Reporter and event sink ───────────────────────────────────

pub type Reports = Rc<RefCell<Vec<(StatusSnapshot, Option<DishImage>)>>>;

pub struct RecordingReporter(pub Reports);

impl StatusReporter for RecordingReporter {
    fn report(&mut self, snapshot: StatusSnapshot, image: Option<DishImage>) {
        self.0.borrow_mut().push((snapshot, image));
    }
}

pub type Events = Rc<RefCell<Vec<FeederEvent>>>;

pub struct RecordingSink(pub Events);

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &FeederEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A fully wired [`FeederCore`] plus handles to every mock.
pub struct Rig {
    pub core: FeederCore,
    pub clock: Arc<ManualClock>,
    pub inbox: CommandInbox,
    pub servo: Rc<RefCell<ServoState>>,
    pub button: Rc<Cell<bool>>,
    pub distance: Rc<Cell<f32>>,
    pub camera_lag: Rc<Cell<Duration>>,
    pub camera_shade: Rc<Cell<u8>>,
    pub captures: Rc<Cell<usize>>,
    pub during_feed: DuringFeed,
    pub reports: Reports,
    pub events: Events,
    /// Holds the dish pictures; removed with the rig.
    pub dir: tempfile::TempDir,
}

pub struct RigOptions {
    pub start: NaiveDateTime,
    pub servo: bool,
    pub camera: bool,
    pub schedule: Option<ScheduleTable>,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self { start: at(12, 0, 0), servo: true, camera: false, schedule: None }
    }
}

impl Rig {
    pub fn new() -> Self {
        Self::with(RigOptions::default())
    }

    /// Default options, but no schedule entries fire.
    pub fn quiet() -> Self {
        Self::with(RigOptions { schedule: Some(ScheduleTable::new(Duration::ZERO)), ..RigOptions::default() })
    }

    pub fn with(opts: RigOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = FeederConfig {
            full_dish_image: dir.path().join("full.png"),
            compare_dish_image: dir.path().join("compare.png"),
            ..FeederConfig::default()
        };

        let clock = ManualClock::starting_at(opts.start);
        let (inbox, commands) = command_channel(clock.clone());

        let servo = Rc::new(RefCell::new(ServoState::default()));
        let button = Rc::new(Cell::new(false));
        let distance = Rc::new(Cell::new(11.0)); // 50 % with the default calibration
        let camera_lag = Rc::new(Cell::new(Duration::ZERO));
        let camera_shade = Rc::new(Cell::new(128));
        let captures = Rc::new(Cell::new(0));
        let during_feed: DuringFeed = Rc::default();
        let reports: Reports = Rc::default();
        let events: Events = Rc::default();

        let ports = FeederPorts {
            servo: opts
                .servo
                .then(|| Box::new(MockServo(servo.clone())) as Box<dyn ServoPort>),
            delay: Box::new(MockDelay { clock: clock.clone(), during_feed: during_feed.clone() }),
            button: Some(Box::new(ButtonDriver::new(MockPin(button.clone())))),
            distance: Some(Box::new(MockDistance(distance.clone()))),
            camera: opts.camera.then(|| {
                Box::new(MockCamera {
                    clock: clock.clone(),
                    lag: camera_lag.clone(),
                    shade: camera_shade.clone(),
                    captures: captures.clone(),
                }) as Box<dyn CameraPort>
            }),
            reporter: Box::new(RecordingReporter(reports.clone())),
            sink: Box::new(RecordingSink(events.clone())),
        };

        let mut core = FeederCore::new(&config, ports, clock.clone(), commands);
        if let Some(schedule) = opts.schedule {
            core = core.with_schedule(schedule);
        }
        core.start();

        Self {
            core,
            clock,
            inbox,
            servo,
            button,
            distance,
            camera_lag,
            camera_shade,
            captures,
            during_feed,
            reports,
            events,
            dir,
        }
    }

    /// Run a guarded tick, then advance the clock by one tick period.
    pub fn tick(&mut self) {
        self.core.guarded_tick();
        self.clock.advance(Duration::from_millis(500));
    }

    /// Run `f` halfway through the next servo hold.
    pub fn during_next_feed(&self, f: impl FnOnce() + 'static) {
        self.during_feed.borrow_mut().push(Box::new(f));
    }

    pub fn engage_count(&self) -> usize {
        self.servo
            .borrow()
            .calls
            .iter()
            .filter(|c| **c == ServoCall::Engage)
            .count()
    }

    pub fn count_events(&self, pred: impl Fn(&FeederEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}
