//! Application core: pure domain logic, zero I/O.
//!
//! The per-tick pipeline (sample, history, alert, display, publish) lives
//! in [`service`].  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod render;
pub mod service;
