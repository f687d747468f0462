//! Servo actuation with guaranteed release.
//!
//! One feed episode is engage → hold → release.  The release step is owned
//! by a drop guard, so it runs on the normal path, on an engage error and
//! while unwinding from a panic inside the hold.  The controller owns the
//! only [`ActuationState`] in the system; nothing else drives the servo.
//!
//! ```text
//!   Idle ──run()──▶ Feeding ──(hold elapsed | error | panic)──▶ Idle
//!                      │
//!                      └── release() always issued
//! ```

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::app::ports::ServoPort;
use crate::config::MAX_FEED_SECS;
use crate::error::ActuatorError;

/// Whether a feed episode is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationState {
    Idle,
    Feeding,
}

/// Result of a successful [`ActuatorController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The servo was held for `duration` and released.
    Completed { duration: Duration },
    /// No servo is configured; nothing moved.
    Skipped,
}

pub struct ActuatorController {
    servo: Option<Box<dyn ServoPort>>,
    delay: Box<dyn DelayNs>,
    state: ActuationState,
}

impl ActuatorController {
    /// `servo: None` makes every run a logged no-op.
    pub fn new(servo: Option<Box<dyn ServoPort>>, delay: Box<dyn DelayNs>) -> Self {
        Self {
            servo,
            delay,
            state: ActuationState::Idle,
        }
    }

    pub fn has_servo(&self) -> bool {
        self.servo.is_some()
    }

    pub fn state(&self) -> ActuationState {
        self.state
    }

    pub fn is_feeding(&self) -> bool {
        self.state == ActuationState::Feeding
    }

    /// Run one feed episode.  Blocks for the (clamped) duration.
    ///
    /// The servo is released before this returns, whatever happened.  A
    /// release failure is reported as [`ActuatorError::ReleaseFailed`] but
    /// the controller is back in `Idle` regardless.
    pub fn run(&mut self, duration: Duration) -> Result<FeedOutcome, ActuatorError> {
        if self.state == ActuationState::Feeding {
            warn!("Actuator: run requested while feeding");
            return Err(ActuatorError::Busy);
        }

        let Self { servo, delay, state } = self;
        let Some(servo) = servo.as_deref_mut() else {
            info!("Actuator: no servo configured, feed skipped");
            return Ok(FeedOutcome::Skipped);
        };

        let duration = clamp_feed(duration);
        *state = ActuationState::Feeding;
        let guard = ReleaseGuard { servo, state, armed: true };

        if let Err(e) = guard.servo.engage() {
            error!("Actuator: engage failed: {}", e);
            if let Err(re) = guard.release() {
                error!("Actuator: release after failed engage: {}", re);
            }
            return Err(e);
        }

        info!("Actuator: feeding for {} ms", duration.as_millis());
        delay.delay_ms(duration_ms(duration));

        guard.release()?;
        info!("Actuator: feed complete");
        Ok(FeedOutcome::Completed { duration })
    }

    /// Return the servo to neutral and the state to `Idle`.  Used after a
    /// fault caught at the tick boundary.
    pub fn force_neutral(&mut self) -> Result<(), ActuatorError> {
        self.state = ActuationState::Idle;
        match self.servo.as_deref_mut() {
            Some(servo) => servo.release(),
            None => Ok(()),
        }
    }
}

/// Clamp a requested feed time into `1..=MAX_FEED_SECS` seconds.
pub fn clamp_feed(duration: Duration) -> Duration {
    duration.clamp(
        Duration::from_secs(1),
        Duration::from_secs(u64::from(MAX_FEED_SECS)),
    )
}

fn duration_ms(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

/// Releases the servo and resets the state when dropped, unless
/// [`ReleaseGuard::release`] already did.
struct ReleaseGuard<'a> {
    servo: &'a mut dyn ServoPort,
    state: &'a mut ActuationState,
    armed: bool,
}

impl ReleaseGuard<'_> {
    fn release(mut self) -> Result<(), ActuatorError> {
        self.armed = false;
        *self.state = ActuationState::Idle;
        self.servo.release()
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        *self.state = ActuationState::Idle;
        if let Err(e) = self.servo.release() {
            error!("Actuator: release during unwind failed: {}", e);
        }
    }
}
