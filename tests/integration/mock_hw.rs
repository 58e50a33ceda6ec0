//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full history
//! without touching real UART/I2C or a broker.

use std::cell::RefCell;
use std::collections::VecDeque;

use co2monitor::alert::AlertLevel;
use co2monitor::app::events::{AppEvent, SensorKind};
use co2monitor::app::ports::{Clock, DisplayPort, EventSink, PublishPort, SensorPort};
use co2monitor::error::{BrokerError, DisplayError};
use co2monitor::publisher::{PublishOutcome, Topic};
use co2monitor::sensors::{ClimateSample, Reading, Sample};

// ── Sensors ───────────────────────────────────────────────────

/// Hands out pre-computed samples; an empty script means "nothing read".
#[derive(Default)]
pub struct MockSensors {
    script: VecDeque<Sample>,
}

#[allow(dead_code)]
impl MockSensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A CO2-only sample whose raw and smoothed values match.
    pub fn push_co2(&mut self, ppm: u16) {
        self.script.push_back(Sample {
            reading: Reading {
                co2_ppm: Some(ppm),
                ..Reading::default()
            },
            co2_smoothed: Some(f32::from(ppm)),
        });
    }

    pub fn push_failure(&mut self) {
        self.script.push_back(Sample::default());
    }
}

impl SensorPort for MockSensors {
    fn sample(&mut self, now_ms: u64) -> Sample {
        let mut s = self.script.pop_front().unwrap_or_default();
        s.reading.timestamp_ms = now_ms;
        s
    }
}

// ── Display ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Co2(Option<u16>, AlertLevel),
    Climate(ClimateSample),
    History(Vec<u16>, AlertLevel),
    Flush,
}

#[derive(Default)]
pub struct MockDisplay {
    pub calls: Vec<DrawCall>,
}

#[allow(dead_code)]
impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushes(&self) -> usize {
        self.calls.iter().filter(|c| **c == DrawCall::Flush).count()
    }

    pub fn last_co2(&self) -> Option<(Option<u16>, AlertLevel)> {
        self.calls.iter().rev().find_map(|c| match c {
            DrawCall::Co2(ppm, level) => Some((*ppm, *level)),
            _ => None,
        })
    }
}

impl DisplayPort for MockDisplay {
    fn show_co2(&mut self, ppm: Option<u16>, level: AlertLevel) -> Result<(), DisplayError> {
        self.calls.push(DrawCall::Co2(ppm, level));
        Ok(())
    }

    fn show_climate(&mut self, climate: &ClimateSample) -> Result<(), DisplayError> {
        self.calls.push(DrawCall::Climate(*climate));
        Ok(())
    }

    fn show_history(&mut self, samples: &[u16], level: AlertLevel) -> Result<(), DisplayError> {
        self.calls.push(DrawCall::History(samples.to_vec(), level));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.calls.push(DrawCall::Flush);
        Ok(())
    }
}

// ── Publisher ─────────────────────────────────────────────────

/// Captures enqueued payloads without any broker behind it.
#[derive(Default)]
pub struct MockPublisher {
    pub sent: RefCell<Vec<(Topic, String)>>,
}

#[allow(dead_code)]
impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self, topic: Topic) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl PublishPort for MockPublisher {
    fn publish(&self, topic: Topic, payload: &str) -> Result<PublishOutcome, BrokerError> {
        self.sent.borrow_mut().push((topic, payload.to_owned()));
        Ok(PublishOutcome::Queued)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockEventSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_changes(&self) -> Vec<(AlertLevel, AlertLevel)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::AlertChanged(a) => Some((a.from, a.to)),
                _ => None,
            })
            .collect()
    }

    pub fn unavailable(&self, sensor: SensorKind) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::SensorUnavailable {
                    sensor: s,
                    consecutive,
                } if *s == sensor => Some(*consecutive),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MockEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Time moves only when the test says so.
#[derive(Default)]
pub struct ManualClock {
    now: std::cell::Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: std::cell::Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
