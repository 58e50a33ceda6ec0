//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MonitorService (domain)
//! ```
//!
//! Driven adapters (sensors, display, broker, settings store, clock)
//! implement these traits.  The [`MonitorService`](super::service::MonitorService)
//! consumes them via generics, so the domain core never touches hardware
//! directly and every stage can be exercised with mocks on the host.

use crate::alert::AlertLevel;
use crate::error::{BrokerError, DisplayError, SensorError, StorageError};
use crate::publisher::{PublishOutcome, Topic};
use crate::sensors::{ClimateSample, Sample};

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A CO2 transport (MH-Z19 over UART on device).
pub trait Co2Sensor {
    /// One blocking read, bounded by the transport's own deadline.
    fn read_ppm(&mut self) -> Result<u16, SensorError>;

    /// Tear down and reopen the transport after a failed read.
    fn reinit(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// A temperature / pressure / humidity probe (BME680 over I2C on device).
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateSample, SensorError>;

    /// Retry bring-up after a failed read (a probe absent at boot, a
    /// loose connector).
    fn reinit(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// Read-side port: the domain calls this once per tick.
///
/// Never fails; a field the hardware could not deliver is simply absent.
pub trait SensorPort {
    fn sample(&mut self, now_ms: u64) -> Sample;
}

// ───────────────────────────────────────────────────────────────
// Settings port (driven adapter: domain ← persistent key/value store)
// ───────────────────────────────────────────────────────────────

/// Read-only view of the persistent settings store.
pub trait SettingsPort {
    /// `Ok(None)` when the key is simply not set.
    fn get_string(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → draw surface)
// ───────────────────────────────────────────────────────────────

/// Draw surface.  Each call replaces one region; nothing is visible
/// until [`flush`](DisplayPort::flush).
pub trait DisplayPort {
    /// Numeric CO2 stat (smoothed); `None` before the first valid reading.
    fn show_co2(&mut self, ppm: Option<u16>, level: AlertLevel) -> Result<(), DisplayError>;

    fn show_climate(&mut self, climate: &ClimateSample) -> Result<(), DisplayError>;

    /// Graph of raw samples, oldest first.
    fn show_history(&mut self, samples: &[u16], level: AlertLevel) -> Result<(), DisplayError>;

    fn flush(&mut self) -> Result<(), DisplayError>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: publisher link task → MQTT client)
// ───────────────────────────────────────────────────────────────

/// Minimal broker client.  Only ever driven from the publisher's link
/// thread, hence `Send`.
pub trait BrokerPort: Send {
    /// Establish (or confirm) a session.  Must not block for longer than
    /// the client's network timeout.
    fn connect(&mut self) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

/// What the loop sees of the publisher: a non-blocking enqueue.
pub trait PublishPort {
    fn publish(&self, topic: Topic, payload: &str) -> Result<PublishOutcome, BrokerError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the service)
// ───────────────────────────────────────────────────────────────

/// Callback the [`Scheduler`](crate::scheduler::Scheduler) invokes on
/// every tick.  The main loop implements it by running one
/// [`MonitorService::tick`](super::service::MonitorService::tick).
pub trait TickDelegate {
    /// * `tick`: 1-based tick counter.
    /// * `now_ms`: clock reading at the tick's start.
    fn on_tick(&mut self, tick: u64, now_ms: u64);
}
