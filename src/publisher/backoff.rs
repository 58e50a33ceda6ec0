//! Capped exponential reconnect backoff.
//!
//! 1 s → 2 s → 4 s … capped at 60 s; a successful connect resets it.

pub const INITIAL_BACKOFF_MS: u64 = 1_000;
pub const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u64,
    max_ms: u64,
    delay_ms: u64,
    /// Earliest time the next attempt may run.
    not_before_ms: u64,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF_MS, MAX_BACKOFF_MS)
    }
}

impl Backoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            delay_ms: initial_ms,
            not_before_ms: 0,
            failures: 0,
        }
    }

    /// Whether an attempt is allowed at `now_ms`.
    pub fn ready(&self, now_ms: u64) -> bool {
        now_ms >= self.not_before_ms
    }

    /// Milliseconds until [`ready`](Self::ready) turns true.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.not_before_ms.saturating_sub(now_ms)
    }

    /// Record a failed attempt and arm the next window.  Returns the wait.
    pub fn on_failure(&mut self, now_ms: u64) -> u64 {
        let wait = self.delay_ms;
        self.not_before_ms = now_ms.saturating_add(wait);
        self.delay_ms = self.delay_ms.saturating_mul(2).min(self.max_ms);
        self.failures = self.failures.saturating_add(1);
        wait
    }

    pub fn on_success(&mut self) {
        self.delay_ms = self.initial_ms;
        self.not_before_ms = 0;
        self.failures = 0;
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
