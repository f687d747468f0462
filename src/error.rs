//! Unified error types for the PetFeeder controller.
//!
//! `Error` is what the control loop and startup can fail with.  Sensor and
//! communication failures never reach it: the sensor reader turns them into
//! unknown readings and the reporter worker logs them, so they have their
//! own `Copy` enums that travel through logs and events without allocation.
//!
//! | Class                 | Where it is handled                          |
//! |-----------------------|----------------------------------------------|
//! | hardware I/O          | locally; actuator forced back to neutral     |
//! | malformed command     | discarded at decode, acknowledged regardless |
//! | network / reporting   | logged by the reporter worker, never retried |
//! | anything else in tick | logged at the tick boundary, loop continues  |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Failures that end a tick or abort startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// GPIO read or write returned an error.
    GpioFailed,
    /// The ultrasonic echo never started or never ended.
    EchoTimeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The camera process failed or produced no file.
    CaptureFailed,
    /// The camera process did not finish within its time box.
    CaptureTimeout,
    /// An image file could not be opened or decoded.
    ImageDecodeFailed,
    /// Reference and sample images have different dimensions.
    ImageSizeMismatch,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioFailed => write!(f, "GPIO access failed"),
            Self::EchoTimeout => write!(f, "echo timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::CaptureFailed => write!(f, "image capture failed"),
            Self::CaptureTimeout => write!(f, "image capture timed out"),
            Self::ImageDecodeFailed => write!(f, "image decode failed"),
            Self::ImageSizeMismatch => write!(f, "image sizes differ"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// A feed episode is already in progress.
    Busy,
    /// Driving the servo to its active position failed.
    PwmWriteFailed,
    /// Detaching the servo failed.  The controller is still back in `Idle`.
    ReleaseFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "feed already in progress"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::ReleaseFailed => write!(f, "servo release failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// A bounded hand-off queue was full and the item was dropped.
    QueueFull,
    /// The HTTP request could not be sent or timed out.
    HttpFailed,
    /// The backend answered with a non-success status.
    HttpStatus(u16),
    /// The command listener socket could not be bound.
    ListenerBindFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "queue full"),
            Self::HttpFailed => write!(f, "HTTP request failed"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::ListenerBindFailed => write!(f, "command listener bind failed"),
        }
    }
}
