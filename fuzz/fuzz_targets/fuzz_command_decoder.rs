//! Fuzz target: `app::commands::decode`
//!
//! Drives arbitrary byte sequences into the remote command decoder and
//! asserts that it never panics and that every accepted feed duration is
//! inside the allowed range.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use petfeeder::app::commands::{decode, FeedCommand};
use petfeeder::config::MAX_FEED_SECS;

fuzz_target!(|data: &[u8]| {
    if let Ok(FeedCommand::Feed { duration: Some(d) }) = decode(data) {
        assert!(d >= Duration::from_secs(1));
        assert!(d <= Duration::from_secs(u64::from(MAX_FEED_SECS)));
    }
});
