//! PetFeeder controller: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Hardware (rppal)   FswebcamCamera   HttpStatusReporter        │
//! │  (Servo/Button/     (CameraPort)     (StatusReporter)          │
//! │   DistancePort)                                                │
//! │  TcpCommandListener LogEventSink     JsonConfigFile            │
//! │  (CommandInbox)     (EventSink)      (ConfigPort)              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              FeederCore (single control thread)        │    │
//! │  │  TriggerQueue · ScheduleTable · ActuatorController     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{info, warn};
use rppal::hal::Delay;

use petfeeder::adapters::command_listener::TcpCommandListener;
use petfeeder::adapters::config_file::{ConfigOrigin, JsonConfigFile};
use petfeeder::adapters::hardware::Hardware;
use petfeeder::adapters::http_reporter::HttpStatusReporter;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::logger;
use petfeeder::adapters::time::SystemClock;
use petfeeder::app::ports::Clock;
use petfeeder::app::service::{FeederCore, FeederPorts};
use petfeeder::channels::command_channel;

fn main() -> Result<()> {
    // ── 1. Configuration ──────────────────────────────────────
    let config_file = JsonConfigFile::locate(std::env::args().nth(1));
    let (config, origin) = config_file
        .load_or_default()
        .with_context(|| format!("loading {}", config_file.path().display()))?;
    config.validate().context("invalid configuration")?;

    // ── 2. Logging ────────────────────────────────────────────
    logger::init(&config.log_dir, config.logging_enabled)?;
    info!("PetFeeder v{} starting", env!("CARGO_PKG_VERSION"));
    match origin {
        ConfigOrigin::File => info!("Config: loaded {}", config_file.path().display()),
        ConfigOrigin::Defaults => {
            info!("Config: {} not found, using defaults", config_file.path().display());
        }
    }
    info!("Config: {:?}", config);

    // ── 3. Clock and command channel ──────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let (inbox, commands) = command_channel(clock.clone());

    // ── 4. Hardware ───────────────────────────────────────────
    let hardware = Hardware::open(&config)?;

    // ── 5. Remote commands ────────────────────────────────────
    let _listener = match config.command_listen_port {
        Some(port) => match TcpCommandListener::spawn(("0.0.0.0", port), inbox) {
            Ok(l) => Some(l),
            Err(e) => {
                warn!("Remote commands disabled: {}", e);
                None
            }
        },
        None => {
            info!("Remote commands disabled by config");
            None
        }
    };

    // ── 6. Core ───────────────────────────────────────────────
    let ports = FeederPorts {
        servo: hardware.servo,
        delay: Box::new(Delay::new()),
        button: hardware.button,
        distance: hardware.distance,
        camera: hardware.camera,
        reporter: Box::new(HttpStatusReporter::spawn(&config)),
        sink: Box::new(LogEventSink::new()),
    };
    let mut core = FeederCore::new(&config, ports, clock, commands);

    // ── 7. Shutdown on SIGINT / SIGTERM ───────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("installing signal handler")?;

    // ── 8. Run ────────────────────────────────────────────────
    let stats = core.run(&shutdown);
    info!(
        "Shutdown: {} ticks, {} feeds, {} dropped, {} overruns",
        stats.ticks, stats.feeds_completed, stats.dropped_triggers, stats.overruns
    );
    log::logger().flush();
    Ok(())
}
