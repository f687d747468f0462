//! Actuation control.
//!
//! [`actuator::ActuatorController`] is the single owner of the feeding
//! servo and of the `Idle`/`Feeding` state.

pub mod actuator;
