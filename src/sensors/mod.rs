//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns one CO2 transport and one climate probe and produces a
//! [`Sample`] each tick.  Transport failures and implausible values turn
//! into absent fields; nothing here ever fails the tick.

pub mod climate;
pub mod mhz19;
pub mod smoothing;

use log::{debug, warn};

use crate::app::ports::{ClimateSensor, Co2Sensor, SensorPort};
use crate::error::SensorError;
use smoothing::{CO2_WINDOW, MovingAverage};

/// One tick's worth of measurements.  Absent fields are not published
/// and do not feed history or alerting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub co2_ppm: Option<u16>,
    pub temperature_c: Option<f32>,
    pub pressure_hpa: Option<f32>,
    pub humidity_pct: Option<f32>,
    /// Monotonic milliseconds since boot.
    pub timestamp_ms: u64,
}

/// What the climate probe returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub pressure_hpa: f32,
    pub humidity_pct: f32,
}

/// A [`Reading`] plus the smoothed CO2 value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub reading: Reading,
    /// Moving average; `Some` only on ticks with a valid CO2 read.
    pub co2_smoothed: Option<f32>,
}

impl Sample {
    /// Climate fields, if all three are present.
    pub fn climate(&self) -> Option<ClimateSample> {
        let r = &self.reading;
        Some(ClimateSample {
            temperature_c: r.temperature_c?,
            pressure_hpa: r.pressure_hpa?,
            humidity_pct: r.humidity_pct?,
        })
    }
}

/// Plausibility limits.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    pub co2_max_ppm: u16,
    pub temperature_c: (f32, f32),
    pub humidity_pct: (f32, f32),
    pub pressure_hpa: (f32, f32),
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            co2_max_ppm: 10_000,
            temperature_c: (-40.0, 85.0),
            humidity_pct: (0.0, 100.0),
            pressure_hpa: (300.0, 1100.0),
        }
    }
}

impl ValidationLimits {
    pub fn check_co2(&self, ppm: u16) -> Result<u16, SensorError> {
        if ppm == 0 || ppm > self.co2_max_ppm {
            return Err(SensorError::OutOfRange);
        }
        Ok(ppm)
    }

    fn check(value: f32, (lo, hi): (f32, f32)) -> Option<f32> {
        (value.is_finite() && (lo..=hi).contains(&value)).then_some(value)
    }
}

/// Aggregates the CO2 transport and climate probe.
pub struct SensorHub<C, T> {
    co2: C,
    climate: T,
    limits: ValidationLimits,
    co2_avg: MovingAverage<CO2_WINDOW>,
    co2_failures: u32,
    climate_failures: u32,
}

impl<C: Co2Sensor, T: ClimateSensor> SensorHub<C, T> {
    pub fn new(co2: C, climate: T) -> Self {
        Self::with_limits(co2, climate, ValidationLimits::default())
    }

    pub fn with_limits(co2: C, climate: T, limits: ValidationLimits) -> Self {
        Self {
            co2,
            climate,
            limits,
            co2_avg: MovingAverage::new(),
            co2_failures: 0,
            climate_failures: 0,
        }
    }

    /// Consecutive failed CO2 reads (reset on the next good one).
    pub fn co2_failures(&self) -> u32 {
        self.co2_failures
    }

    /// Consecutive failed climate reads.
    pub fn climate_failures(&self) -> u32 {
        self.climate_failures
    }

    pub fn co2_sensor_mut(&mut self) -> &mut C {
        &mut self.co2
    }

    pub fn climate_sensor_mut(&mut self) -> &mut T {
        &mut self.climate
    }

    fn read_co2(&mut self) -> Result<u16, SensorError> {
        let ppm = self.co2.read_ppm()?;
        self.limits.check_co2(ppm)
    }

    fn sample_co2(&mut self) -> (Option<u16>, Option<f32>) {
        match self.read_co2() {
            Ok(ppm) => {
                self.co2_failures = 0;
                let smoothed = self.co2_avg.push(f32::from(ppm));
                (Some(ppm), Some(smoothed))
            }
            Err(e) => {
                self.co2_failures = self.co2_failures.saturating_add(1);
                warn!(
                    "Sensors: CO2 read failed ({}), {} in a row",
                    e, self.co2_failures
                );
                if let Err(re) = self.co2.reinit() {
                    warn!("Sensors: CO2 transport reinit failed ({})", re);
                }
                (None, None)
            }
        }
    }

    fn sample_climate(&mut self) -> (Option<f32>, Option<f32>, Option<f32>) {
        match self.climate.read() {
            Ok(c) => {
                self.climate_failures = 0;
                let l = &self.limits;
                let t = ValidationLimits::check(c.temperature_c, l.temperature_c);
                let p = ValidationLimits::check(c.pressure_hpa, l.pressure_hpa);
                let h = ValidationLimits::check(c.humidity_pct, l.humidity_pct);
                if t.is_none() || p.is_none() || h.is_none() {
                    warn!(
                        "Sensors: climate value out of range (T={:.1} P={:.1} H={:.1})",
                        c.temperature_c, c.pressure_hpa, c.humidity_pct
                    );
                }
                (t, p, h)
            }
            Err(e) => {
                self.climate_failures = self.climate_failures.saturating_add(1);
                warn!(
                    "Sensors: climate read failed ({}), {} in a row",
                    e, self.climate_failures
                );
                if self.climate.reinit().is_err() {
                    debug!("Sensors: climate probe reinit failed");
                }
                (None, None, None)
            }
        }
    }
}

impl<C: Co2Sensor, T: ClimateSensor> SensorPort for SensorHub<C, T> {
    fn sample(&mut self, now_ms: u64) -> Sample {
        let (co2_ppm, co2_smoothed) = self.sample_co2();
        let (temperature_c, pressure_hpa, humidity_pct) = self.sample_climate();
        Sample {
            reading: Reading {
                co2_ppm,
                temperature_c,
                pressure_hpa,
                humidity_pct,
                timestamp_ms: now_ms,
            },
            co2_smoothed,
        }
    }
}
