//! Outbound application events and status snapshots.
//!
//! The [`FeederCore`](super::service::FeederCore) emits [`FeederEvent`]s
//! through the [`EventSink`](super::ports::EventSink) port and hands
//! [`StatusSnapshot`]s to the [`StatusReporter`](super::ports::StatusReporter).

use core::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ActuatorError, Error};
use crate::events::TriggerSource;

use super::commands::DecodeError;

/// A 0–100 % fill estimate, or unknown when the sensor is absent or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillLevel {
    Known(u8),
    Unknown,
}

impl FillLevel {
    /// Clamp a raw percentage into a known level.
    pub fn percent(value: u8) -> Self {
        Self::Known(value.min(100))
    }

    pub fn as_percent(self) -> Option<u8> {
        match self {
            Self::Known(p) => Some(p),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(p) => write!(f, "{}%", p),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Right after a completed feed.  Carries the fill time.
    Fill,
    /// Periodic status tick.
    Periodic,
    /// Remote image request.  Only the dish is measured.
    Image,
}

/// Immutable status record handed to the reporter.
///
/// `triggered_at` is the wall-clock time of the trigger that caused it, so
/// the backend can match a snapshot to its feed even if uploads lag.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub kind: SnapshotKind,
    pub taken_at: DateTime<Utc>,
    pub triggered_at: DateTime<Utc>,
    pub hopper: FillLevel,
    pub dish: FillLevel,
}

/// A captured dish picture.  The bytes are read right after capture, so a
/// later capture to the same path cannot change what gets uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct DishImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for DishImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DishImage({}, {} bytes)", self.file_name, self.bytes.len())
    }
}

/// Why a trigger was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// It arrived while a feed episode was running.
    FeedInProgress,
    /// The trigger queue was full.
    QueueFull,
}

/// Structured events emitted by the feeder core.
#[derive(Debug, Clone)]
pub enum FeederEvent {
    /// The core has started; reports which capabilities are present.
    Started { servo: bool, button: bool, distance: bool },

    /// A feed episode began.
    FeedStarted { source: TriggerSource, duration: Duration },

    /// A feed episode finished and the servo was released.
    FeedCompleted { source: TriggerSource, duration: Duration },

    /// A feed was requested but no servo is configured.
    FeedSkipped { source: TriggerSource },

    /// A feed episode failed.  The servo was still released.
    FeedFailed { source: TriggerSource, error: ActuatorError },

    /// A trigger was dropped under the no-overlap policy.
    TriggerDropped { source: TriggerSource, reason: DropReason },

    /// An inbound remote message could not be decoded.
    CommandRejected(DecodeError),

    /// A status snapshot was handed to the reporter.
    StatusQueued(StatusSnapshot),

    /// A tick exceeded its processing budget.
    TickOverrun { elapsed: Duration, budget: Duration },

    /// A tick failed or panicked; the loop carried on.
    TickFault(TickFault),
}

/// What went wrong inside a tick.
#[derive(Debug, Clone)]
pub enum TickFault {
    Error(Error),
    Panic(String),
}
