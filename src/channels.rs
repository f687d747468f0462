//! Remote command hand-off.
//!
//! Uses an `embassy-sync` bounded channel to bridge the command listener
//! thread with the synchronous control loop.  The listener only stamps and
//! enqueues raw bytes; decoding happens on the control thread, so nothing
//! on the listener side ever touches the servo or the sensors.
//!
//! ```text
//! ┌──────────────────┐  RawCommand  ┌──────────────┐
//! │ Command listener │─────────────▶│ Control Loop │
//! │ (bg thread)      │  try_send    │ try_receive  │
//! └──────────────────┘              └──────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::Clock;

/// Largest accepted remote message.
pub const MAX_FRAME_LEN: usize = 512;

/// Channel depth for inbound messages.
const CMD_DEPTH: usize = 8;

/// An undecoded remote message and the uptime it was received at.
pub struct RawCommand {
    pub received_at: Duration,
    pub frame: Vec<u8, MAX_FRAME_LEN>,
}

/// Inbound command channel: listener → control loop.
pub type CommandChannel = Channel<CriticalSectionRawMutex, RawCommand, CMD_DEPTH>;

/// What happened to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Receipt acknowledged.  Says nothing about whether the message is
    /// valid or whether the command will run.
    Accepted,
    /// The channel was full; the message was discarded.
    QueueFull,
}

/// Producer half, held by the listener.  Cheap to clone.
#[derive(Clone)]
pub struct CommandInbox {
    channel: Arc<CommandChannel>,
    clock: Arc<dyn Clock>,
}

/// Consumer half, held by the control loop.
pub struct CommandReceiver {
    channel: Arc<CommandChannel>,
}

/// Create a connected inbox/receiver pair.
pub fn command_channel(clock: Arc<dyn Clock>) -> (CommandInbox, CommandReceiver) {
    let channel = Arc::new(CommandChannel::new());
    (
        CommandInbox { channel: channel.clone(), clock },
        CommandReceiver { channel },
    )
}

impl CommandInbox {
    /// Stamp and enqueue one message.  Never blocks.
    ///
    /// Oversized messages are acknowledged and discarded, like any other
    /// message the decoder would reject.
    pub fn deliver(&self, payload: &[u8]) -> Disposition {
        let received_at = self.clock.uptime();

        let Ok(frame) = Vec::from_slice(payload) else {
            warn!(
                "Command inbox: {}-byte message exceeds {} bytes, discarded",
                payload.len(),
                MAX_FRAME_LEN
            );
            return Disposition::Accepted;
        };

        match self.channel.try_send(RawCommand { received_at, frame }) {
            Ok(()) => {
                debug!("Command inbox: queued {} bytes", payload.len());
                Disposition::Accepted
            }
            Err(_) => {
                warn!("Command inbox: channel full, message dropped");
                Disposition::QueueFull
            }
        }
    }
}

impl CommandReceiver {
    /// Take the oldest pending message, if any.  Never blocks.
    pub fn try_next(&self) -> Option<RawCommand> {
        self.channel.try_receive().ok()
    }

    /// Number of messages waiting.
    pub fn pending(&self) -> usize {
        self.channel.len()
    }
}
