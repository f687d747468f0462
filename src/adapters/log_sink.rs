//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured feeder events through the
//! `log` facade, so they land on the console and in `all.log` / `error.log`.

use log::{error, info, warn};

use crate::app::events::{DropReason, FeederEvent, TickFault};
use crate::app::ports::EventSink;

/// Adapter that logs every [`FeederEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &FeederEvent) {
        match event {
            FeederEvent::Started { servo, button, distance } => {
                info!(
                    "START | servo={} button={} distance={}",
                    present(*servo),
                    present(*button),
                    present(*distance)
                );
            }
            FeederEvent::FeedStarted { source, duration } => {
                info!("FEED  | {} started, {} s", source, duration.as_secs());
            }
            FeederEvent::FeedCompleted { source, duration } => {
                info!("FEED  | {} complete after {} s", source, duration.as_secs());
            }
            FeederEvent::FeedSkipped { source } => {
                info!("FEED  | {} skipped, no servo", source);
            }
            FeederEvent::FeedFailed { source, error: e } => {
                error!("FEED  | {} failed: {}", source, e);
            }
            FeederEvent::TriggerDropped { source, reason } => match reason {
                DropReason::FeedInProgress => {
                    warn!("DROP  | {} trigger during feed", source);
                }
                DropReason::QueueFull => {
                    warn!("DROP  | {} trigger, queue full", source);
                }
            },
            FeederEvent::CommandRejected(e) => {
                warn!("CMD   | rejected: {}", e);
            }
            FeederEvent::StatusQueued(s) => {
                info!(
                    "STATUS| {:?} hopper={} dish={} triggered={}",
                    s.kind,
                    s.hopper,
                    s.dish,
                    s.triggered_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            FeederEvent::TickOverrun { elapsed, budget } => {
                warn!(
                    "TICK  | overrun {} ms (budget {} ms)",
                    elapsed.as_millis(),
                    budget.as_millis()
                );
            }
            FeederEvent::TickFault(TickFault::Error(e)) => {
                error!("TICK  | error: {}", e);
            }
            FeederEvent::TickFault(TickFault::Panic(msg)) => {
                error!("TICK  | panic: {}", msg);
            }
        }
    }
}

fn present(flag: bool) -> &'static str {
    if flag { "yes" } else { "absent" }
}
