//! Hardware drivers: button, servo and camera.
//!
//! The button is generic over `embedded-hal`; the servo needs `rppal`
//! software PWM and is only built with the `rpi` feature.

pub mod button;
pub mod camera;
#[cfg(feature = "rpi")]
pub mod servo;
