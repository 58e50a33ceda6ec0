//! Monitor service: the hexagonal core.
//!
//! [`MonitorService`] owns the alert machine, the history buffer and the
//! display repaint cache.  All I/O flows through port traits passed in at
//! the call site, so the whole pipeline runs against mocks on the host.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ DisplayPort
//!                 │      MonitorService       │ ──▶ PublishPort
//!                 │ History · Alert · Render  │ ──▶ EventSink
//!                 └──────────────────────────┘
//! ```
//!
//! One [`tick`](MonitorService::tick) runs, in order: sample, history,
//! alert, display, publish metrics, publish alert.  A failing stage is
//! logged and never stops the stages after it.

use log::{info, warn};

use crate::alert::{AlertEvent, AlertLevel, AlertMachine, Thresholds};
use crate::config::Config;
use crate::history::{GRAPH_WIDTH, HistoryBuffer};
use crate::publisher::{PublishOutcome, Topic, format_decimal, format_ppm};
use crate::sensors::{Reading, Sample};

use super::events::{AppEvent, SensorKind};
use super::ports::{DisplayPort, EventSink, PublishPort, SensorPort};
use super::render::RenderCache;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub reading: Reading,
    pub co2_smoothed: Option<f32>,
    pub level: AlertLevel,
    pub alert: Option<AlertEvent>,
    /// Payloads accepted by the publisher this tick.
    pub published: u8,
    pub publish_errors: u8,
    pub display_flushed: bool,
}

/// The application service orchestrates all domain logic.
pub struct MonitorService {
    alert: AlertMachine,
    history: HistoryBuffer<GRAPH_WIDTH>,
    render: RenderCache,
    history_every: u32,
    /// Valid CO2 samples since the last history push.
    history_countdown: u32,
    /// Last smoothed value shown, kept across failed ticks.
    shown_co2: Option<u16>,
    co2_misses: u32,
    climate_misses: u32,
    tick_count: u64,
}

impl MonitorService {
    pub fn new(config: &Config) -> Self {
        Self {
            alert: AlertMachine::new(Thresholds::from_config(config)),
            history: HistoryBuffer::new(),
            render: RenderCache::new(),
            history_every: config.history_every_n_ticks.max(1),
            history_countdown: 0,
            shown_co2: None,
            co2_misses: 0,
            climate_misses: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.alert.level()));
        info!("MonitorService started at level {}", self.alert.level());
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(
        &mut self,
        now_ms: u64,
        sensors: &mut impl SensorPort,
        display: &mut impl DisplayPort,
        publisher: &impl PublishPort,
        sink: &mut impl EventSink,
    ) -> TickReport {
        self.tick_count += 1;

        // 1–2. Sample; validation and smoothing happen in the hub
        let sample = sensors.sample(now_ms);
        let Sample {
            reading,
            co2_smoothed,
        } = sample;
        self.track_misses(&reading, sink);

        // 3. History (raw value, decimated)
        if let Some(ppm) = reading.co2_ppm {
            self.push_history(ppm);
        }

        // 4. Alert machine (holds its level when there is no value)
        let alert = self.alert.update(co2_smoothed, now_ms);
        let level = self.alert.level();
        if let Some(smoothed) = co2_smoothed {
            self.shown_co2 = Some(smoothed.round() as u16);
        }

        // 5. Display
        let climate = sample.climate();
        let display_flushed = match self.render.render(
            display,
            self.shown_co2,
            level,
            climate,
            &self.history,
        ) {
            Ok(flushed) => flushed,
            Err(e) => {
                warn!("Display update failed: {}", e);
                false
            }
        };

        // 6. Publish present metrics
        let mut report = TickReport {
            reading,
            co2_smoothed,
            level,
            alert,
            published: 0,
            publish_errors: 0,
            display_flushed,
        };
        if let Some(ppm) = reading.co2_ppm {
            Self::publish(publisher, Topic::Co2, &format_ppm(ppm), &mut report);
        }
        let climate_fields = [
            (Topic::Temperature, reading.temperature_c),
            (Topic::Pressure, reading.pressure_hpa),
            (Topic::Humidity, reading.humidity_pct),
        ];
        for (topic, value) in climate_fields {
            if let Some(v) = value {
                Self::publish(publisher, topic, &format_decimal(v), &mut report);
            }
        }

        // 7. Alert transition
        if let Some(event) = alert {
            match serde_json::to_string(&event) {
                Ok(json) => Self::publish(publisher, Topic::Alert, &json, &mut report),
                Err(e) => warn!("Alert payload encoding failed: {}", e),
            }
            sink.emit(&AppEvent::AlertChanged(event));
        }

        sink.emit(&AppEvent::Telemetry {
            reading,
            co2_smoothed,
            level,
        });
        report
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn level(&self) -> AlertLevel {
        self.alert.level()
    }

    pub fn history(&self) -> &HistoryBuffer<GRAPH_WIDTH> {
        &self.history
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn push_history(&mut self, ppm: u16) {
        if self.history_countdown == 0 {
            self.history.push(ppm);
        }
        self.history_countdown = (self.history_countdown + 1) % self.history_every;
    }

    fn track_misses(&mut self, reading: &Reading, sink: &mut impl EventSink) {
        if reading.co2_ppm.is_some() {
            self.co2_misses = 0;
        } else {
            self.co2_misses = self.co2_misses.saturating_add(1);
            sink.emit(&AppEvent::SensorUnavailable {
                sensor: SensorKind::Co2,
                consecutive: self.co2_misses,
            });
        }

        let climate_complete = reading.temperature_c.is_some()
            && reading.pressure_hpa.is_some()
            && reading.humidity_pct.is_some();
        if climate_complete {
            self.climate_misses = 0;
        } else {
            self.climate_misses = self.climate_misses.saturating_add(1);
            sink.emit(&AppEvent::SensorUnavailable {
                sensor: SensorKind::Climate,
                consecutive: self.climate_misses,
            });
        }
    }

    fn publish(publisher: &impl PublishPort, topic: Topic, payload: &str, report: &mut TickReport) {
        match publisher.publish(topic, payload) {
            Ok(PublishOutcome::Queued | PublishOutcome::QueuedDroppedOldest) => {
                report.published += 1;
            }
            Err(e) => {
                warn!("Publish {} failed: {}", topic.metric(), e);
                report.publish_errors += 1;
            }
        }
    }
}
