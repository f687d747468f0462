//! Hardware adapter: opens the Pi peripherals named in the config and hands
//! them out as port trait objects.
//!
//! This is the only module that touches `rppal`.  Each part is optional:
//! a `None` pin means the capability is absent, and a part that fails to
//! open is logged and left out, unless `require_hardware` is set, in which
//! case startup fails.

use log::{info, warn};
use rppal::gpio::Gpio;
use rppal::hal::Delay;

use crate::app::ports::{ButtonPort, CameraPort, DistancePort, ServoPort};
use crate::config::FeederConfig;
use crate::drivers::button::ButtonDriver;
use crate::drivers::camera::FswebcamCamera;
use crate::drivers::servo::RppalServo;
use crate::error::Error;
use crate::sensors::distance::UltrasonicSensor;

/// Every peripheral the feeder can use.
pub struct Hardware {
    pub servo: Option<Box<dyn ServoPort>>,
    pub button: Option<Box<dyn ButtonPort>>,
    pub distance: Option<Box<dyn DistancePort>>,
    pub camera: Option<Box<dyn CameraPort>>,
}

impl Hardware {
    pub fn open(config: &FeederConfig) -> Result<Self, Error> {
        let camera: Option<Box<dyn CameraPort>> = Some(Box::new(FswebcamCamera::new()));

        let gpio = match Gpio::new() {
            Ok(gpio) => gpio,
            Err(e) => {
                if config.require_hardware {
                    return Err(Error::Init("GPIO unavailable"));
                }
                warn!("Hardware: GPIO unavailable ({}), running without servo, button and distance sensor", e);
                return Ok(Self { servo: None, button: None, distance: None, camera });
            }
        };

        let servo = match config.servo_pin {
            Some(pin) => match gpio.get(pin) {
                Ok(p) => {
                    info!("Hardware: servo on GPIO{}", pin);
                    Some(Box::new(RppalServo::new(p.into_output_low())) as Box<dyn ServoPort>)
                }
                Err(e) => missing(config, "servo", pin, &e)?,
            },
            None => None,
        };

        let button = match config.button_pin {
            Some(pin) => match gpio.get(pin) {
                Ok(p) => {
                    info!("Hardware: button on GPIO{}", pin);
                    Some(Box::new(ButtonDriver::new(p.into_input_pullup())) as Box<dyn ButtonPort>)
                }
                Err(e) => missing(config, "button", pin, &e)?,
            },
            None => None,
        };

        let distance = match (config.distance_trigger_pin, config.distance_echo_pin) {
            (Some(trig), Some(echo)) => match (gpio.get(trig), gpio.get(echo)) {
                (Ok(t), Ok(e)) => {
                    info!("Hardware: distance sensor trig GPIO{} echo GPIO{}", trig, echo);
                    let sensor =
                        UltrasonicSensor::new(t.into_output_low(), e.into_input_pulldown(), Delay::new());
                    Some(Box::new(sensor) as Box<dyn DistancePort>)
                }
                (Err(e), _) => missing(config, "distance trigger", trig, &e)?,
                (_, Err(e)) => missing(config, "distance echo", echo, &e)?,
            },
            _ => None,
        };

        Ok(Self { servo, button, distance, camera })
    }
}

/// Fail when hardware is required, otherwise log and carry on without it.
fn missing<T>(
    config: &FeederConfig,
    part: &str,
    pin: u8,
    err: &rppal::gpio::Error,
) -> Result<Option<T>, Error> {
    if config.require_hardware {
        return Err(Error::Init("configured GPIO pin unavailable"));
    }
    warn!("Hardware: {} on GPIO{} unavailable: {}", part, pin, err);
    Ok(None)
}
