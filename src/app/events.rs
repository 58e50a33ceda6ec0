//! Outbound application events.
//!
//! The [`MonitorService`](super::service::MonitorService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them.

use crate::alert::{AlertEvent, AlertLevel};
use crate::sensors::Reading;

/// Which physical sensor a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Co2,
    Climate,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial alert level).
    Started(AlertLevel),

    /// Per-tick measurement snapshot.
    Telemetry {
        reading: Reading,
        co2_smoothed: Option<f32>,
        level: AlertLevel,
    },

    /// The alert level changed.
    AlertChanged(AlertEvent),

    /// A sensor delivered nothing usable this tick.
    SensorUnavailable { sensor: SensorKind, consecutive: u32 },
}
