//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::{AppEvent, SensorKind};
use crate::app::ports::EventSink;

/// Logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// `-` for a missing field.
struct Opt<T>(Option<T>);

impl core::fmt::Display for Opt<f32> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.2}", v),
            None => f.write_str("-"),
        }
    }
}

impl core::fmt::Display for Opt<u16> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("-"),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry {
                reading,
                co2_smoothed,
                level,
            } => {
                info!(
                    "TELEM | t={}ms | CO2={}ppm avg={} [{}] | T={}\u{00b0}C P={}hPa RH={}%",
                    reading.timestamp_ms,
                    Opt(reading.co2_ppm),
                    Opt(*co2_smoothed),
                    level,
                    Opt(reading.temperature_c),
                    Opt(reading.pressure_hpa),
                    Opt(reading.humidity_pct),
                );
            }
            AppEvent::AlertChanged(e) => {
                info!(
                    "ALERT | {} -> {} at {:.0}ppm (t={}ms)",
                    e.from, e.to, e.value, e.timestamp_ms
                );
            }
            AppEvent::SensorUnavailable {
                sensor,
                consecutive,
            } => {
                let name = match sensor {
                    SensorKind::Co2 => "co2",
                    SensorKind::Climate => "climate",
                };
                warn!("SENSOR | {} unavailable ({} in a row)", name, consecutive);
            }
            AppEvent::Started(level) => {
                info!("START | initial_level={}", level);
            }
        }
    }
}
