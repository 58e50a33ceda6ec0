//! Log-backed draw surface.
//!
//! Implements [`DisplayPort`] by staging region updates and writing one
//! `DISPLAY | ...` line per flush.  Stands in for the e-paper panel, whose
//! layout and font rendering are outside this crate.

use core::fmt::Write;

use log::info;

use crate::alert::AlertLevel;
use crate::app::ports::DisplayPort;
use crate::error::DisplayError;
use crate::sensors::ClimateSample;

/// Staged frame, committed on [`flush`](DisplayPort::flush).
#[derive(Debug, Default)]
pub struct LogDisplay {
    co2: Option<(Option<u16>, AlertLevel)>,
    climate: Option<ClimateSample>,
    history: Option<(usize, Option<u16>, Option<u16>)>,
    dirty: bool,
    frames: u32,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Text of the current frame, as it would be logged.
    pub fn frame_text(&self) -> heapless::String<160> {
        let mut s = heapless::String::new();
        // Truncation on overflow is acceptable for a log line.
        let _ = match self.co2 {
            Some((Some(ppm), level)) => write!(s, "CO2 {} ppm [{}]", ppm, level),
            Some((None, level)) => write!(s, "CO2 --- ppm [{}]", level),
            None => write!(s, "CO2 ---"),
        };
        if let Some(c) = self.climate {
            let _ = write!(
                s,
                " | {:.1}\u{00b0}C {:.0}hPa {:.0}%",
                c.temperature_c, c.pressure_hpa, c.humidity_pct
            );
        }
        if let Some((n, Some(lo), Some(hi))) = self.history {
            let _ = write!(s, " | graph n={} {}..{}", n, lo, hi);
        }
        s
    }
}

impl DisplayPort for LogDisplay {
    fn show_co2(&mut self, ppm: Option<u16>, level: AlertLevel) -> Result<(), DisplayError> {
        self.co2 = Some((ppm, level));
        self.dirty = true;
        Ok(())
    }

    fn show_climate(&mut self, climate: &ClimateSample) -> Result<(), DisplayError> {
        self.climate = Some(*climate);
        self.dirty = true;
        Ok(())
    }

    fn show_history(&mut self, samples: &[u16], _level: AlertLevel) -> Result<(), DisplayError> {
        let lo = samples.iter().copied().min();
        let hi = samples.iter().copied().max();
        self.history = Some((samples.len(), lo, hi));
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        if self.dirty {
            info!("DISPLAY | {}", self.frame_text());
            self.dirty = false;
            self.frames = self.frames.wrapping_add(1);
        }
        Ok(())
    }
}
