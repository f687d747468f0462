//! Port traits: the hexagonal boundary between the feeder core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederCore (domain)
//! ```
//!
//! Driven adapters (servo, button, distance sensor, camera, status uploads,
//! event sinks, config storage) implement these traits.  The
//! [`FeederCore`](super::service::FeederCore) owns them as trait objects, so
//! the control loop never touches GPIO, processes or sockets directly and the
//! whole loop runs against mocks on the host.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::FeederConfig;
use crate::error::{ActuatorError, SensorError};

use super::events::{DishImage, FeederEvent, StatusSnapshot};

// ───────────────────────────────────────────────────────────────
// Servo port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The feeding servo.  Only the [`ActuatorController`](crate::control::actuator::ActuatorController)
/// calls this.
pub trait ServoPort {
    /// Drive the servo to its active (dispensing) position.
    fn engage(&mut self) -> Result<(), ActuatorError>;

    /// Stop driving the servo and return it to neutral.  Must be safe to
    /// call repeatedly and after a failed `engage`.
    fn release(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Button port (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Edge-triggered view of the feed button.
pub trait ButtonPort {
    /// Sample the button.  `true` exactly once per released→pressed edge;
    /// a held button does not fire again.
    fn poll_pressed_edge(&mut self) -> bool;

    /// Resynchronise after the loop was blocked by a feed.  A press that
    /// began during the feed is swallowed; returns `true` if one was.
    fn rearm(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Distance from the sensor to the food surface in the hopper.
pub trait DistancePort {
    fn distance_cm(&mut self) -> Result<f32, SensorError>;
}

/// Still camera pointed at the dish.
pub trait CameraPort {
    /// Capture one picture to `path`, giving up after `timeout`.
    fn capture(&mut self, path: &Path, timeout: Duration) -> Result<(), SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Status reporter port (domain → backend)
// ───────────────────────────────────────────────────────────────

/// Best-effort delivery of status snapshots.
///
/// Implementations must return quickly (enqueue, not send) and must
/// swallow every failure: the control loop never learns whether an upload
/// succeeded.  Snapshots handed over in order must be delivered in order.
pub trait StatusReporter {
    fn report(&mut self, snapshot: StatusSnapshot, image: Option<DishImage>);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`FeederEvent`]s through this port.  Adapters
/// decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &FeederEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source shared by the core, the schedule and the command inbox.
///
/// `uptime` is monotonic and orders triggers; the wall-clock readings drive
/// daily schedules and status timestamps.
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn uptime(&self) -> Duration;

    /// Local wall-clock time (daily schedules are in local time).
    fn local_now(&self) -> NaiveDateTime;

    /// UTC wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads the controller configuration at startup.
///
/// Implementations MUST validate before handing the config out; invalid
/// ranges are rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<FeederConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config file exists.
    NotFound,
    /// The file exists but is not valid JSON for [`FeederConfig`].
    Corrupted(String),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the file.
    IoError(std::io::ErrorKind),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(kind) => write!(f, "I/O error: {}", kind),
        }
    }
}

impl std::error::Error for ConfigError {}
