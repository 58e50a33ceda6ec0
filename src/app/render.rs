//! Display repaint cache.
//!
//! Remembers what was last drawn in each region and only redraws a region
//! whose inputs changed.  The surface is flushed only when something was
//! redrawn.  A region that fails to draw stays dirty and is retried on
//! the next tick.

use crate::alert::AlertLevel;
use crate::app::ports::DisplayPort;
use crate::error::DisplayError;
use crate::history::HistoryBuffer;
use crate::sensors::ClimateSample;

#[derive(Debug, Default)]
pub struct RenderCache {
    co2: Option<(Option<u16>, AlertLevel)>,
    climate: Option<ClimateSample>,
    history: Option<(u32, AlertLevel)>,
    needs_flush: bool,
    frames: u32,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed flushes so far.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Bring the surface up to date.  Returns whether a flush happened.
    ///
    /// `climate` of `None` keeps the previously drawn values on screen.
    pub fn render<const N: usize>(
        &mut self,
        display: &mut impl DisplayPort,
        co2: Option<u16>,
        level: AlertLevel,
        climate: Option<ClimateSample>,
        history: &HistoryBuffer<N>,
    ) -> Result<bool, DisplayError> {
        if self.co2 != Some((co2, level)) {
            display.show_co2(co2, level)?;
            self.co2 = Some((co2, level));
            self.needs_flush = true;
        }

        if let Some(c) = climate {
            if self.climate != Some(c) {
                display.show_climate(&c)?;
                self.climate = Some(c);
                self.needs_flush = true;
            }
        }

        let graph_key = (history.generation(), level);
        if self.history != Some(graph_key) {
            display.show_history(&history.snapshot(), level)?;
            self.history = Some(graph_key);
            self.needs_flush = true;
        }

        if !self.needs_flush {
            return Ok(false);
        }
        display.flush()?;
        self.needs_flush = false;
        self.frames = self.frames.wrapping_add(1);
        Ok(true)
    }
}
