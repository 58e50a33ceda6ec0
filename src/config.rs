//! Monitor configuration.
//!
//! Loaded once at startup from the settings store (NVS on device) and
//! immutable afterwards.  Every key has a default; unreadable or
//! unparsable values fall back to it with a warning.  Only a settings
//! store that cannot be reached at all is fatal.

use core::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::SettingsPort;
use crate::error::{ConfigError, StorageError};

// ── Settings keys ─────────────────────────────────────────────

pub const NS_OWNER: &str = "owner";
pub const NS_SENSORS: &str = "sensors";

pub const KEY_ROOM_NAME: &str = "name";
pub const KEY_BROKER_HOST: &str = "mqtt.server";
pub const KEY_BROKER_PORT: &str = "mqtt.port";
pub const KEY_TOPIC_PREFIX: &str = "mqtt.prefix";
pub const KEY_WARN_PPM: &str = "co2.warn";
pub const KEY_CRIT_PPM: &str = "co2.crit";
pub const KEY_HYSTERESIS_PPM: &str = "co2.hyst";
pub const KEY_PERIOD_MS: &str = "period_ms";
pub const KEY_HISTORY_EVERY: &str = "hist.every";

pub const DEFAULT_ROOM_NAME: &str = "co2monitor";
pub const DEFAULT_BROKER_HOST: &str = "homeassistant.local";
pub const DEFAULT_TOPIC_PREFIX: &str = "sensors";

/// Core monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // --- Identity / broker ---
    /// Room name, used as the second topic segment.
    pub room_name: String,
    pub broker_host: String,
    pub broker_port: u16,
    /// First topic segment(s); may contain `/` for a multi-level prefix.
    pub topic_prefix: String,

    // --- CO2 alerting ---
    /// Smoothed ppm at which NORMAL becomes WARNING.
    pub warn_threshold_ppm: u16,
    /// Smoothed ppm at which WARNING becomes CRITICAL.
    pub crit_threshold_ppm: u16,
    /// Extra margin below a threshold before stepping down (0 = none).
    pub hysteresis_ppm: u16,

    // --- Timing ---
    /// Tick period in milliseconds.
    pub sample_period_ms: u32,
    /// Push every n-th valid CO2 sample into the history graph.
    pub history_every_n_ticks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            room_name: DEFAULT_ROOM_NAME.into(),
            broker_host: DEFAULT_BROKER_HOST.into(),
            broker_port: 1883,
            topic_prefix: DEFAULT_TOPIC_PREFIX.into(),

            warn_threshold_ppm: 800,
            crit_threshold_ppm: 1500,
            hysteresis_ppm: 0,

            sample_period_ms: 1000, // 1 Hz
            history_every_n_ticks: 1,
        }
    }
}

impl Config {
    /// Read every key from `store`, falling back to defaults per key.
    ///
    /// Returns [`ConfigError::StoreUnavailable`] only when the store
    /// reports it cannot be reached; all other failures degrade to the
    /// default for that key.
    pub fn load(store: &impl SettingsPort) -> Result<Self, ConfigError> {
        let d = Self::default();

        let room_name = read_str(store, NS_OWNER, KEY_ROOM_NAME)?
            .map(|s| sanitize_segment(&s, false))
            .filter(|s| !s.is_empty())
            .unwrap_or(d.room_name);
        let broker_host = read_str(store, NS_SENSORS, KEY_BROKER_HOST)?
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.broker_host);
        let topic_prefix = read_str(store, NS_SENSORS, KEY_TOPIC_PREFIX)?
            .map(|s| sanitize_segment(&s, true))
            .filter(|s| !s.is_empty())
            .unwrap_or(d.topic_prefix);

        let mut cfg = Self {
            room_name,
            broker_host,
            broker_port: read_num(store, NS_SENSORS, KEY_BROKER_PORT, d.broker_port)?,
            topic_prefix,
            warn_threshold_ppm: read_num(store, NS_SENSORS, KEY_WARN_PPM, d.warn_threshold_ppm)?,
            crit_threshold_ppm: read_num(store, NS_SENSORS, KEY_CRIT_PPM, d.crit_threshold_ppm)?,
            hysteresis_ppm: read_num(store, NS_SENSORS, KEY_HYSTERESIS_PPM, d.hysteresis_ppm)?,
            sample_period_ms: read_num(store, NS_SENSORS, KEY_PERIOD_MS, d.sample_period_ms)?,
            history_every_n_ticks: read_num(
                store,
                NS_SENSORS,
                KEY_HISTORY_EVERY,
                d.history_every_n_ticks,
            )?,
        };

        // Fall back per rule so one bad value does not discard the rest.
        if let Err(e) = validate_levels(cfg.warn_threshold_ppm, cfg.crit_threshold_ppm) {
            warn!("Config: {}, using default warn/crit thresholds", e);
            cfg.warn_threshold_ppm = d.warn_threshold_ppm;
            cfg.crit_threshold_ppm = d.crit_threshold_ppm;
        }
        if let Err(e) = validate_hysteresis(cfg.hysteresis_ppm, cfg.warn_threshold_ppm) {
            warn!("Config: {}, using {}", e, d.hysteresis_ppm);
            cfg.hysteresis_ppm = d.hysteresis_ppm;
        }
        if let Err(e) = validate_period(cfg.sample_period_ms) {
            warn!("Config: {}, using {}ms", e, d.sample_period_ms);
            cfg.sample_period_ms = d.sample_period_ms;
        }
        if let Err(e) = validate_history_every(cfg.history_every_n_ticks) {
            warn!("Config: {}, using {}", e, d.history_every_n_ticks);
            cfg.history_every_n_ticks = d.history_every_n_ticks;
        }

        Ok(cfg)
    }

    /// `mqtt://host:port` URL for the broker client.
    pub fn broker_url(&self) -> String {
        format!("mqtt://{}:{}", self.broker_host, self.broker_port)
    }
}

/// Range-check the numeric fields.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    validate_levels(cfg.warn_threshold_ppm, cfg.crit_threshold_ppm)?;
    validate_hysteresis(cfg.hysteresis_ppm, cfg.warn_threshold_ppm)?;
    validate_period(cfg.sample_period_ms)?;
    validate_history_every(cfg.history_every_n_ticks)
}

fn validate_levels(warn_ppm: u16, crit_ppm: u16) -> Result<(), ConfigError> {
    if warn_ppm == 0 {
        return Err(ConfigError::Invalid("warn_threshold_ppm must be >= 1"));
    }
    if crit_ppm <= warn_ppm {
        return Err(ConfigError::Invalid(
            "crit_threshold_ppm must be > warn_threshold_ppm",
        ));
    }
    Ok(())
}

fn validate_hysteresis(hysteresis_ppm: u16, warn_ppm: u16) -> Result<(), ConfigError> {
    if hysteresis_ppm >= warn_ppm {
        return Err(ConfigError::Invalid(
            "hysteresis_ppm must be < warn_threshold_ppm",
        ));
    }
    Ok(())
}

fn validate_period(period_ms: u32) -> Result<(), ConfigError> {
    if !(100..=60_000).contains(&period_ms) {
        return Err(ConfigError::Invalid("sample_period_ms must be 100..=60000"));
    }
    Ok(())
}

fn validate_history_every(every: u32) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&every) {
        return Err(ConfigError::Invalid("history_every_n_ticks must be 1..=3600"));
    }
    Ok(())
}

/// Make a string safe to embed in an MQTT topic.
///
/// Wildcards and whitespace become `_`.  With `allow_slash` the value may
/// span several levels (leading/trailing `/` trimmed); otherwise `/` is
/// replaced too.
pub fn sanitize_segment(raw: &str, allow_slash: bool) -> String {
    let trimmed = raw.trim();
    let trimmed = if allow_slash {
        trimmed.trim_matches('/')
    } else {
        trimmed
    };
    trimmed
        .chars()
        .map(|c| match c {
            '+' | '#' => '_',
            '/' if !allow_slash => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

// ── Store helpers ─────────────────────────────────────────────

fn read_str(
    store: &impl SettingsPort,
    ns: &str,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    match store.get_string(ns, key) {
        Ok(v) => Ok(v),
        Err(StorageError::Unavailable) => Err(ConfigError::StoreUnavailable),
        Err(e) => {
            warn!("Config: reading {}/{} failed ({}), using default", ns, key, e);
            Ok(None)
        }
    }
}

fn read_num<T>(store: &impl SettingsPort, ns: &str, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Copy + core::fmt::Display,
{
    let Some(raw) = read_str(store, ns, key)? else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) => {
            warn!(
                "Config: {}/{}={:?} is not a valid number, using {}",
                ns, key, raw, default
            );
            Ok(default)
        }
    }
}
