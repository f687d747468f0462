//! Controller configuration.
//!
//! All tunable parameters for the PetFeeder.  Built once at startup from the
//! JSON config file (see [`JsonConfigFile`](crate::adapters::config_file::JsonConfigFile))
//! and never mutated afterwards.  Every field has a documented default, so a
//! partial file only overrides what it names.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Upper bound on a single feed episode.
pub const MAX_FEED_SECS: u32 = 60;

/// Core controller configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    // --- Hardware (None = capability absent) ---
    /// Servo signal pin (BCM).
    pub servo_pin: Option<u8>,
    /// Push-button pin (BCM).
    pub button_pin: Option<u8>,
    /// Ultrasonic echo pin (BCM).
    pub distance_echo_pin: Option<u8>,
    /// Ultrasonic trigger pin (BCM).
    pub distance_trigger_pin: Option<u8>,
    /// Refuse to start when a configured part cannot be opened.
    pub require_hardware: bool,

    // --- Dish camera ---
    /// Reference picture of a full dish.  Captured on first use if missing.
    pub full_dish_image: PathBuf,
    /// Scratch path for the fresh comparison picture.
    pub compare_dish_image: PathBuf,
    /// Time box for one camera capture (seconds).
    pub camera_timeout_secs: u32,

    // --- Hopper ---
    /// Distance reading (cm) that means an empty hopper.
    pub hopper_empty_distance_cm: f32,
    /// Distance reading (cm) that means a full hopper.
    pub hopper_full_distance_cm: f32,

    // --- Feeding ---
    /// Servo run time for one feed (seconds).
    pub feed_duration_secs: u32,
    /// Daily wall-clock feed times, local time, "HH:MM".
    #[serde(with = "hhmm_list")]
    pub feed_times: Vec<NaiveTime>,
    /// Interval between status reports (seconds).
    pub status_interval_secs: u32,

    // --- Timing ---
    /// Control loop cadence (milliseconds).
    pub tick_interval_ms: u32,
    /// Processing budget for one tick, not counting servo run time (milliseconds).
    pub max_tick_ms: u32,

    // --- Backend ---
    /// Base URL of the status backend.
    pub backend_url: String,
    /// Bearer token.  No token disables status reporting.
    pub api_token: Option<String>,
    /// Per-request timeout for status uploads (seconds).
    pub report_timeout_secs: u32,
    /// TCP port for inbound remote commands.  `None` disables the listener.
    pub command_listen_port: Option<u16>,

    // --- Logging ---
    /// Directory for `all.log` / `error.log`.
    pub log_dir: PathBuf,
    /// Master switch for all log output.
    pub logging_enabled: bool,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Hardware
            servo_pin: Some(pins::SERVO_GPIO),
            button_pin: Some(pins::BUTTON_GPIO),
            distance_echo_pin: Some(pins::DISTANCE_ECHO_GPIO),
            distance_trigger_pin: Some(pins::DISTANCE_TRIGGER_GPIO),
            require_hardware: false,

            // Camera
            full_dish_image: PathBuf::from("images/full.jpg"),
            compare_dish_image: PathBuf::from("images/compare.jpg"),
            camera_timeout_secs: 10,

            // Hopper (sensor mounted 20 cm above the hopper floor)
            hopper_empty_distance_cm: 20.0,
            hopper_full_distance_cm: 2.0,

            // Feeding
            feed_duration_secs: 5,
            feed_times: vec![hhmm(8, 0), hhmm(20, 0)],
            status_interval_secs: 3600, // hourly

            // Timing
            tick_interval_ms: 500, // 2 Hz
            max_tick_ms: 1000,

            // Backend
            backend_url: "https://onlineservicehub.azurewebsites.net".into(),
            api_token: None,
            report_timeout_secs: 10,
            command_listen_port: Some(7070),

            // Logging
            log_dir: PathBuf::from("logs"),
            logging_enabled: true,
        }
    }
}

impl std::fmt::Debug for FeederConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeederConfig")
            .field("servo_pin", &self.servo_pin)
            .field("button_pin", &self.button_pin)
            .field("distance_echo_pin", &self.distance_echo_pin)
            .field("distance_trigger_pin", &self.distance_trigger_pin)
            .field("require_hardware", &self.require_hardware)
            .field("full_dish_image", &self.full_dish_image)
            .field("compare_dish_image", &self.compare_dish_image)
            .field("camera_timeout_secs", &self.camera_timeout_secs)
            .field("hopper_empty_distance_cm", &self.hopper_empty_distance_cm)
            .field("hopper_full_distance_cm", &self.hopper_full_distance_cm)
            .field("feed_duration_secs", &self.feed_duration_secs)
            .field("feed_times", &self.feed_times)
            .field("status_interval_secs", &self.status_interval_secs)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("max_tick_ms", &self.max_tick_ms)
            .field("backend_url", &self.backend_url)
            .field(
                "api_token",
                if self.api_token.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("report_timeout_secs", &self.report_timeout_secs)
            .field("command_listen_port", &self.command_listen_port)
            .field("log_dir", &self.log_dir)
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

impl FeederConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_duration_secs == 0 || self.feed_duration_secs > MAX_FEED_SECS {
            return Err(ConfigError::ValidationFailed("feed_duration_secs must be 1..=60"));
        }
        if !(50..=1000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be 50..=1000"));
        }
        if self.max_tick_ms < self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed("max_tick_ms must be >= tick_interval_ms"));
        }
        if self.status_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("status_interval_secs must be > 0"));
        }
        if !(1..=60).contains(&self.camera_timeout_secs) {
            return Err(ConfigError::ValidationFailed("camera_timeout_secs must be 1..=60"));
        }
        if !(1..=60).contains(&self.report_timeout_secs) {
            return Err(ConfigError::ValidationFailed("report_timeout_secs must be 1..=60"));
        }
        if self.hopper_full_distance_cm < 0.0
            || self.hopper_empty_distance_cm <= self.hopper_full_distance_cm
        {
            return Err(ConfigError::ValidationFailed(
                "hopper distances need 0 <= full < empty",
            ));
        }
        if self.distance_echo_pin.is_some() != self.distance_trigger_pin.is_some() {
            return Err(ConfigError::ValidationFailed(
                "distance sensor needs both echo and trigger pins",
            ));
        }
        if self.backend_url.is_empty() {
            return Err(ConfigError::ValidationFailed("backend_url must not be empty"));
        }
        Ok(())
    }

    pub fn feed_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.feed_duration_secs))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.status_interval_secs))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_interval_ms))
    }

    pub fn max_tick(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_tick_ms))
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.camera_timeout_secs))
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.report_timeout_secs))
    }

    /// Whether both ultrasonic pins are configured.
    pub fn has_distance_sensor(&self) -> bool {
        self.distance_echo_pin.is_some() && self.distance_trigger_pin.is_some()
    }
}

fn hhmm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// `Vec<NaiveTime>` as a list of `"HH:MM"` strings.
mod hhmm_list {
    use chrono::NaiveTime;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(times: &[NaiveTime], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(times.iter().map(|t| t.format(FORMAT).to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveTime>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| {
                NaiveTime::parse_from_str(s.trim(), FORMAT)
                    .map_err(|e| D::Error::custom(format!("bad feed time '{s}': {e}")))
            })
            .collect()
    }
}
