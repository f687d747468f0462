//! Feeding servo on a Raspberry Pi GPIO.
//!
//! Driven with `rppal` software PWM: a 20 ms period and a 1 ms pulse hold
//! the horn at its minimum position, which opens the hopper gate.
//! Releasing stops the pulse train and pulls the line low so the servo
//! goes limp (detached) instead of holding a position.

use std::time::Duration;

use log::error;
use rppal::gpio::OutputPin;

use crate::app::ports::ServoPort;
use crate::error::ActuatorError;
use crate::pins;

pub struct RppalServo {
    pin: OutputPin,
}

impl RppalServo {
    pub fn new(pin: OutputPin) -> Self {
        Self { pin }
    }
}

impl ServoPort for RppalServo {
    fn engage(&mut self) -> Result<(), ActuatorError> {
        self.pin
            .set_pwm(
                Duration::from_micros(pins::SERVO_PERIOD_US),
                Duration::from_micros(pins::SERVO_MIN_PULSE_US),
            )
            .map_err(|e| {
                error!("Servo: PWM start failed: {}", e);
                ActuatorError::PwmWriteFailed
            })
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        let cleared = self.pin.clear_pwm();
        self.pin.set_low();
        cleared.map_err(|e| {
            error!("Servo: PWM stop failed: {}", e);
            ActuatorError::ReleaseFailed
        })
    }
}
