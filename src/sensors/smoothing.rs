//! Moving average over the last `K` valid CO2 readings.
//!
//! Same ring layout as the other fixed-size sample buffers: a `[f32; K]`
//! with a head index and a fill count.  The average is undefined until
//! the first sample; failed reads never touch the window.

/// Window used for the displayed / alerting CO2 value.
pub const CO2_WINDOW: usize = 4;

pub struct MovingAverage<const K: usize> {
    ring: [f32; K],
    head: usize,
    count: usize,
}

impl<const K: usize> Default for MovingAverage<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> MovingAverage<K> {
    pub const fn new() -> Self {
        Self {
            ring: [0.0; K],
            head: 0,
            count: 0,
        }
    }

    /// Add a sample and return the updated average.
    pub fn push(&mut self, value: f32) -> f32 {
        if K == 0 {
            return value;
        }
        self.ring[self.head] = value;
        self.head = (self.head + 1) % K;
        if self.count < K {
            self.count += 1;
        }
        self.running_average().unwrap_or(value)
    }

    /// Current average; `None` until the first sample.
    pub fn value(&self) -> Option<f32> {
        self.running_average()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn running_average(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let sum: f32 = self.ring[..self.count].iter().sum();
        Some(sum / self.count as f32)
    }
}
