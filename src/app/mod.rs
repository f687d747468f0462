//! Application core: pure domain logic, no direct I/O.
//!
//! This module holds the feeder's business rules: trigger dispatch, the
//! no-overlap policy, status snapshots and remote command decoding.  All
//! interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
