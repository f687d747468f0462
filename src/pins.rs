//! Default GPIO assignments for the PetFeeder board (BCM numbering).
//!
//! Single source of truth for the defaults in
//! [`FeederConfig`](crate::config::FeederConfig).  A deployment overrides
//! them through the config file; set a pin to `null` to mark the part absent.

// ---------------------------------------------------------------------------
// Feeding servo
// ---------------------------------------------------------------------------

/// Signal line of the hopper servo.  Driven with 50 Hz software PWM.
pub const SERVO_GPIO: u8 = 18;

/// Servo frame period.
pub const SERVO_PERIOD_US: u64 = 20_000;
/// Pulse width for the servo's minimum position (hopper open).
pub const SERVO_MIN_PULSE_US: u64 = 1_000;

// ---------------------------------------------------------------------------
// User button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button for a manual feed.
pub const BUTTON_GPIO: u8 = 19;

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic sensor above the hopper
// ---------------------------------------------------------------------------

/// Echo input.  Goes through a 5 V → 3.3 V divider on the board.
pub const DISTANCE_ECHO_GPIO: u8 = 23;
/// Trigger output.
pub const DISTANCE_TRIGGER_GPIO: u8 = 24;
