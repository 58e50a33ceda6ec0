//! CO2 Monitor Firmware: main entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Mhz19 + ClimateProbe   LogDisplay   LogEventSink   NvsSettings│
//! │  (SensorHub)            (Display)    (EventSink)    (Settings) │
//! │  MqttBroker ◀── link thread ── Publisher      MonotonicClock   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MonitorService (pure logic)                 │    │
//! │  │  Smoothing · AlertMachine · History · RenderCache      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (fixed period, delegate-driven) · ShutdownToken     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use log::{info, warn};

use co2monitor::adapters::display::LogDisplay;
use co2monitor::adapters::log_sink::LogEventSink;
use co2monitor::adapters::mqtt::{BrokerSettings, MqttBroker};
use co2monitor::adapters::nvs::NvsSettings;
use co2monitor::adapters::time::MonotonicClock;
use co2monitor::adapters::wifi::{WifiCredentials, WifiStation};
use co2monitor::app::ports::TickDelegate;
use co2monitor::app::service::MonitorService;
use co2monitor::config::Config;
use co2monitor::publisher::{Publisher, Topics};
use co2monitor::scheduler::{Scheduler, ShutdownToken};
use co2monitor::sensors::SensorHub;
use co2monitor::sensors::climate::ClimateProbe;
use co2monitor::sensors::mhz19::Mhz19;

/// Publisher counters are logged this often (in ticks).
const STATS_EVERY_TICKS: u64 = 60;

const I2C_BAUD_HZ: u32 = 100_000;

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about sensors or the
// broker) to one MonitorService tick.

struct MonitorLoop {
    service: MonitorService,
    sensors: SensorHub<Mhz19, ClimateProbe>,
    display: LogDisplay,
    publisher: Publisher,
    sink: LogEventSink,
}

impl TickDelegate for MonitorLoop {
    fn on_tick(&mut self, tick: u64, now_ms: u64) {
        self.service.tick(
            now_ms,
            &mut self.sensors,
            &mut self.display,
            &self.publisher,
            &mut self.sink,
        );

        if tick % STATS_EVERY_TICKS == 0 {
            let s = self.publisher.stats();
            info!(
                "STATS | queued={} published={} dropped={} pending={} connected={} | \
                 co2_failures={} climate_failures={}",
                s.queued,
                s.published,
                s.dropped,
                s.pending,
                s.connected,
                self.sensors.co2_failures(),
                self.sensors.climate_failures(),
            );
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CO2 Monitor v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Settings store and config ──────────────────────────
    // No store means no identity or broker address: halt here.
    let settings = NvsSettings::new().context("settings store unavailable")?;
    let config = Config::load(&settings).context("settings store unavailable")?;
    info!(
        "Config: room={} broker={} prefix={} warn={} crit={} period={}ms",
        config.room_name,
        config.broker_url(),
        config.topic_prefix,
        config.warn_threshold_ppm,
        config.crit_threshold_ppm,
        config.sample_period_ms,
    );

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take().context("system event loop")?;

    // ── 3. Network ────────────────────────────────────────────
    let _wifi = match WifiCredentials::load(&settings) {
        Ok(creds) => match WifiStation::start(peripherals.modem, sysloop, &creds) {
            Ok(station) => Some(station),
            Err(e) => {
                warn!("WiFi: {}, publishing disabled until reboot", e);
                None
            }
        },
        Err(e) => {
            warn!("WiFi: {}, publishing disabled until reboot", e);
            None
        }
    };

    // ── 4. Sensors ────────────────────────────────────────────
    // MH-Z19 on UART1 (TX 16, RX 17); climate probe on I2C0 (SDA 26, SCL 27).
    let co2 = Mhz19::new(
        peripherals.uart1,
        peripherals.pins.gpio16,
        peripherals.pins.gpio17,
    )
    .context("MH-Z19 UART")?;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio26,
        peripherals.pins.gpio27,
        &I2cConfig::new().baudrate(I2C_BAUD_HZ.Hz()),
    )
    .context("I2C bus")?;
    // A missing probe only leaves the climate fields empty; it is
    // retried after every failed read.
    let climate = ClimateProbe::new(i2c);
    let sensors = SensorHub::new(co2, climate);

    // ── 5. Publisher link thread ──────────────────────────────
    let clock = MonotonicClock::new();
    let shutdown = Arc::new(ShutdownToken::new());
    let publisher = Publisher::new();
    let link = publisher
        .spawn(
            MqttBroker::new(BrokerSettings::from_config(&config)),
            Topics::from_config(&config),
            clock,
            shutdown.clone(),
        )
        .context("spawning publisher thread")?;

    // ── 6. Monitor service ────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = MonitorService::new(&config);
    service.start(&mut sink);

    let mut monitor = MonitorLoop {
        service,
        sensors,
        display: LogDisplay::new(),
        publisher,
        sink,
    };

    info!("System ready. Entering sampling loop.");

    // ── 7. Sampling loop ──────────────────────────────────────
    let summary = Scheduler::new(config.sample_period_ms).run(&clock, &shutdown, &mut monitor);
    info!("Sampling loop ended: {:?}", summary);

    if link.join().is_err() {
        warn!("Publisher thread panicked");
    }
    Ok(())
}
