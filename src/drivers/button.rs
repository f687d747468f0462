//! Polled feed button with edge detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with the Pi's internal pull-up.  The control
//! loop samples it once per tick (500 ms default), which is far above the
//! switch's bounce time, so no separate debounce window is kept.
//!
//! ## Edge rules
//!
//! | Previous | Now      | Result                     |
//! |----------|----------|----------------------------|
//! | released | pressed  | edge, latched              |
//! | pressed  | pressed  | nothing (held)             |
//! | any      | released | latch cleared              |
//!
//! After a feed blocks the loop, [`ButtonPort::rearm`] re-samples the pin so
//! a press made during the feed is latched without producing an edge.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::ButtonPort;

pub struct ButtonDriver<P> {
    pin: P,
    /// A press has been reported and the button has not been released since.
    latched: bool,
    read_failed: bool,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            latched: false,
            read_failed: false,
        }
    }

    /// Active-low: a low level means pressed.  Read errors count as released.
    fn is_pressed(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(pressed) => {
                self.read_failed = false;
                pressed
            }
            Err(_) => {
                if !self.read_failed {
                    warn!("Button: GPIO read failed");
                    self.read_failed = true;
                }
                false
            }
        }
    }
}

impl<P: InputPin> ButtonPort for ButtonDriver<P> {
    fn poll_pressed_edge(&mut self) -> bool {
        let pressed = self.is_pressed();
        let edge = pressed && !self.latched;
        self.latched = pressed;
        edge
    }

    fn rearm(&mut self) -> bool {
        let pressed = self.is_pressed();
        let swallowed = pressed && !self.latched;
        self.latched = pressed;
        swallowed
    }
}
