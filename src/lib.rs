//! CO2 monitor firmware library.
//!
//! Exposes the pure-logic modules for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; on the host the adapters run simulation backends.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alert;
pub mod app;
pub mod config;
pub mod error;
pub mod history;
pub mod publisher;
pub mod scheduler;
pub mod sensors;

pub use alert::{AlertEvent, AlertLevel, AlertMachine, Thresholds};
pub use config::Config;
pub use history::{GRAPH_WIDTH, HistoryBuffer};
pub use publisher::{PublishOutcome, Publisher, Topic, Topics};
pub use scheduler::{Scheduler, ShutdownToken};
