//! PetFeeder controller library.
//!
//! Exposes the control core, its ports and the concrete adapters so the
//! binary and the integration tests share one code path.  Everything that
//! needs the Pi's GPIO is behind the `rpi` feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod channels;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pins;
pub mod scheduler;
pub mod sensors;
