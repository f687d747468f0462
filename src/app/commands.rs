//! Inbound remote commands.
//!
//! Remote messages arrive as raw bytes on the
//! [`CommandChannel`](crate::channels::CommandChannel) and are decoded here,
//! on the control thread, into a [`FeedCommand`].  Decoding never panics: a
//! malformed message becomes a [`DecodeError`] that the core logs and drops.
//!
//! Wire format: a JSON object with a `command` field, matched
//! case-insensitively after trimming.
//!
//! ```text
//! {"command": "feed"}
//! {"command": " FEED ", "duration_secs": 3}
//! {"command": "image"}
//! ```

use core::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::config::MAX_FEED_SECS;

/// Decoded remote instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    /// Run a feed.  `None` uses the configured feed duration.
    Feed { duration: Option<Duration> },
    /// Capture a dish picture and upload it with the dish level.
    RequestImage,
}

/// Why a remote message was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length (or whitespace-only) payload.
    Empty,
    /// Not UTF-8 JSON, or not an object.
    Malformed(String),
    /// The object has no string `command` field.
    MissingCommand,
    /// `command` holds a value we do not handle.
    UnknownCommand(String),
    /// `duration_secs` outside 1..=60.
    InvalidDuration(u64),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty payload"),
            Self::Malformed(msg) => write!(f, "malformed payload: {}", msg),
            Self::MissingCommand => write!(f, "missing 'command' field"),
            Self::UnknownCommand(c) => write!(f, "unknown command '{}'", c),
            Self::InvalidDuration(s) => write!(f, "invalid duration {}s", s),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Deserialize)]
struct WireCommand {
    command: Option<String>,
    duration_secs: Option<u64>,
}

/// Decode one raw remote message.
pub fn decode(payload: &[u8]) -> Result<FeedCommand, DecodeError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let wire: WireCommand =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let command = wire.command.ok_or(DecodeError::MissingCommand)?;
    match command.trim().to_lowercase().as_str() {
        "feed" => {
            let duration = match wire.duration_secs {
                None => None,
                Some(secs) if (1..=u64::from(MAX_FEED_SECS)).contains(&secs) => {
                    Some(Duration::from_secs(secs))
                }
                Some(secs) => return Err(DecodeError::InvalidDuration(secs)),
            };
            Ok(FeedCommand::Feed { duration })
        }
        "image" => Ok(FeedCommand::RequestImage),
        other => Err(DecodeError::UnknownCommand(other.to_string())),
    }
}
