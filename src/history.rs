//! Fixed-capacity CO2 history for the graph.
//!
//! A ring buffer of raw ppm samples, one column per sample.  Owned
//! exclusively by the sampling loop; the display only ever gets a copy
//! via [`HistoryBuffer::snapshot`].

use heapless::Vec;

/// Graph width in pixels, one sample per column.
pub const GRAPH_WIDTH: usize = 296;

pub struct HistoryBuffer<const N: usize> {
    ring: [u16; N],
    head: usize,
    count: usize,
    generation: u32,
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HistoryBuffer<N> {
    pub const fn new() -> Self {
        Self {
            ring: [0; N],
            head: 0,
            count: 0,
            generation: 0,
        }
    }

    /// Append a sample, evicting the oldest once full.
    pub fn push(&mut self, ppm: u16) {
        if N == 0 {
            return;
        }
        self.ring[self.head] = ppm;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Copy of the contents, oldest first.
    pub fn snapshot(&self) -> Vec<u16, N> {
        let mut out = Vec::new();
        let start = (self.head + N - self.count) % N.max(1);
        for i in 0..self.count {
            // Cannot overflow: count <= N.
            let _ = out.push(self.ring[(start + i) % N]);
        }
        out
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<u16> {
        if self.count == 0 {
            return None;
        }
        Some(self.ring[(self.head + N - 1) % N])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bumped on every push; lets the renderer skip an unchanged graph.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
