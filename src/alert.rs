//! CO2 alert state machine.
//!
//! Three levels, ordered `Normal < Warning < Critical`, evaluated once per
//! tick against the *smoothed* CO2 value.
//!
//! ## Transition rules
//!
//! | From     | To       | Condition                                   |
//! |----------|----------|---------------------------------------------|
//! | Normal   | Warning  | smoothed ≥ warn                             |
//! | Normal   | Critical | smoothed ≥ crit (single event)              |
//! | Warning  | Critical | smoothed ≥ crit                             |
//! | Critical | Warning  | smoothed < crit − hysteresis                |
//! | Warning  | Normal   | smoothed < warn − hysteresis                |
//!
//! Levels only step down one at a time: Critical never drops straight to
//! Normal, even if the value collapses in one tick.  Ticks without a
//! smoothed value hold the current level.

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AlertLevel {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted on every level change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertEvent {
    pub from: AlertLevel,
    pub to: AlertLevel,
    /// Smoothed value that caused the transition.
    pub value: f32,
    pub timestamp_ms: u64,
}

/// Thresholds in ppm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warn: f32,
    pub crit: f32,
    pub hysteresis: f32,
}

impl Thresholds {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            warn: f32::from(cfg.warn_threshold_ppm),
            crit: f32::from(cfg.crit_threshold_ppm),
            hysteresis: f32::from(cfg.hysteresis_ppm),
        }
    }
}

pub struct AlertMachine {
    level: AlertLevel,
    thresholds: Thresholds,
    transitions: u32,
}

impl AlertMachine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            level: AlertLevel::Normal,
            thresholds,
            transitions: 0,
        }
    }

    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// Total number of transitions since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Feed one tick's smoothed value.  Returns the transition, if any.
    pub fn update(&mut self, smoothed: Option<f32>, now_ms: u64) -> Option<AlertEvent> {
        let value = smoothed?;
        if !value.is_finite() {
            warn!("Alert: ignoring non-finite smoothed value");
            return None;
        }

        let next = self.next_level(value);
        if next == self.level {
            return None;
        }

        let event = AlertEvent {
            from: self.level,
            to: next,
            value,
            timestamp_ms: now_ms,
        };
        if next > self.level {
            warn!(
                "Alert: CO2 {:.0}ppm, {} -> {}",
                value, event.from, event.to
            );
        } else {
            info!(
                "Alert: CO2 {:.0}ppm, {} -> {}",
                value, event.from, event.to
            );
        }
        self.level = next;
        self.transitions = self.transitions.saturating_add(1);
        Some(event)
    }

    fn next_level(&self, value: f32) -> AlertLevel {
        let t = &self.thresholds;
        match self.level {
            AlertLevel::Normal if value >= t.crit => AlertLevel::Critical,
            AlertLevel::Normal if value >= t.warn => AlertLevel::Warning,
            AlertLevel::Warning if value >= t.crit => AlertLevel::Critical,
            AlertLevel::Warning if value < t.warn - t.hysteresis => AlertLevel::Normal,
            AlertLevel::Critical if value < t.crit - t.hysteresis => AlertLevel::Warning,
            level => level,
        }
    }
}
