//! Trigger queue.
//!
//! Triggers are produced by:
//! - the feed button (edge detected at the start of a tick)
//! - the schedule table (due entries)
//! - remote commands (decoded from the command channel)
//!
//! All three share one bounded queue ordered by when each trigger was
//! observed, never by source.  The queue is drained completely within the tick that filled it.
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ Button      │────▶│               │     │              │
//! │ Schedule    │────▶│ Trigger Queue │────▶│  FeederCore  │
//! │ Remote cmd  │────▶│ (FIFO, bound) │     │  dispatch    │
//! └─────────────┘     └───────────────┘     └──────────────┘
//! ```

use core::fmt;
use std::time::Duration;

use heapless::{Deque, Vec};

use crate::app::commands::FeedCommand;

/// Maximum number of pending triggers per tick.
pub const TRIGGER_QUEUE_CAP: usize = 32;

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Button,
    Schedule(&'static str),
    Remote,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button => write!(f, "button"),
            Self::Schedule(label) => write!(f, "schedule '{}'", label),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// What the trigger asks the core to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Run the servo for `duration`.
    Feed { duration: Duration },
    /// Measure the dish and upload the picture.
    RequestImage,
    /// Measure hopper and dish and upload the levels.
    ReportStatus,
}

impl TriggerAction {
    /// Map a remote command onto an action, filling in the default duration.
    pub fn from_command(cmd: FeedCommand, default_feed: Duration) -> Self {
        match cmd {
            FeedCommand::Feed { duration } => Self::Feed {
                duration: duration.unwrap_or(default_feed),
            },
            FeedCommand::RequestImage => Self::RequestImage,
        }
    }
}

/// One pending request.  `observed_at` is clock uptime when the trigger
/// was seen (for remote commands: when the message was received).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub source: TriggerSource,
    pub action: TriggerAction,
    pub observed_at: Duration,
}

/// Bounded queue of triggers, oldest observation first.
///
/// Triggers observed at the same instant keep their push order, so the
/// queue is FIFO by arrival, whichever source collected them first.
pub struct TriggerQueue {
    inner: Deque<Trigger, TRIGGER_QUEUE_CAP>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self { inner: Deque::new() }
    }

    /// Insert a trigger behind every trigger observed at or before it.
    /// Returns it back if the queue is full.
    pub fn push(&mut self, trigger: Trigger) -> Result<(), Trigger> {
        if self.inner.is_full() {
            return Err(trigger);
        }
        let mut later: Vec<Trigger, TRIGGER_QUEUE_CAP> = Vec::new();
        while self.inner.back().is_some_and(|t| t.observed_at > trigger.observed_at) {
            if let Some(t) = self.inner.pop_back() {
                let _ = later.push(t);
            }
        }
        let _ = self.inner.push_back(trigger);
        while let Some(t) = later.pop() {
            let _ = self.inner.push_back(t);
        }
        Ok(())
    }

    /// Take the oldest trigger.
    pub fn pop(&mut self) -> Option<Trigger> {
        self.inner.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Default for TriggerQueue {
    fn default() -> Self {
        Self::new()
    }
}
