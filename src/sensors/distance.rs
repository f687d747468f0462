//! HC-SR04 ultrasonic distance sensor.
//!
//! A 10 µs pulse on TRIG starts a measurement; ECHO is then held high for
//! the round-trip time of the ping.  Sound covers 1 cm and back in about
//! 58 µs.
//!
//! Each reading is the median of [`SAMPLES`] pings, so one stray echo off
//! the hopper wall does not move the fill estimate.
//!
//! Generic over the `embedded-hal` 1.0 pin and delay traits: on the Pi the
//! pins are `rppal` GPIO, on the host they are mocks.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use crate::app::ports::DistancePort;
use crate::error::SensorError;

/// The sensor gives up and drops ECHO after 38 ms when nothing returns.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(38);

/// Pings per reading.
pub const SAMPLES: usize = 3;

/// Settle time between pings so the previous echo has died out.
const PING_GAP_MS: u32 = 60;

/// Datasheet range.
const MIN_CM: f32 = 2.0;
const MAX_CM: f32 = 400.0;

/// Round-trip echo time in microseconds per centimetre of distance.
const US_PER_CM: f32 = 58.0;

/// Convert an echo pulse width to a distance.
pub fn pulse_to_cm(pulse: Duration) -> f32 {
    pulse.as_micros() as f32 / US_PER_CM
}

pub struct UltrasonicSensor<T, E, D> {
    trigger: T,
    echo: E,
    delay: D,
}

impl<T, E, D> UltrasonicSensor<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    pub fn new(trigger: T, echo: E, delay: D) -> Self {
        Self { trigger, echo, delay }
    }

    /// One ping.
    fn ping(&mut self) -> Result<f32, SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(10);
        self.trigger.set_low().map_err(|_| SensorError::GpioFailed)?;

        let armed = Instant::now();
        while !self.echo.is_high().map_err(|_| SensorError::GpioFailed)? {
            if armed.elapsed() > ECHO_TIMEOUT {
                return Err(SensorError::EchoTimeout);
            }
        }

        let rising = Instant::now();
        while self.echo.is_high().map_err(|_| SensorError::GpioFailed)? {
            if rising.elapsed() > ECHO_TIMEOUT {
                return Err(SensorError::EchoTimeout);
            }
        }

        let cm = pulse_to_cm(rising.elapsed());
        if !(MIN_CM..=MAX_CM).contains(&cm) {
            return Err(SensorError::OutOfRange);
        }
        Ok(cm)
    }
}

impl<T, E, D> DistancePort for UltrasonicSensor<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    fn distance_cm(&mut self) -> Result<f32, SensorError> {
        let mut readings: heapless::Vec<f32, SAMPLES> = heapless::Vec::new();
        let mut last_err = SensorError::EchoTimeout;

        for i in 0..SAMPLES {
            if i > 0 {
                self.delay.delay_ms(PING_GAP_MS);
            }
            match self.ping() {
                // Capacity equals the loop count.
                Ok(cm) => {
                    let _ = readings.push(cm);
                }
                Err(e) => {
                    debug!("Distance: ping {} failed: {}", i, e);
                    last_err = e;
                }
            }
        }

        match median(&mut readings) {
            Some(cm) => Ok(cm),
            None => {
                warn!("Distance: no valid echo in {} pings", SAMPLES);
                Err(last_err)
            }
        }
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    Some(values[values.len() / 2])
}
