//! Fixed-period tick scheduler.
//!
//! Drives the sampling loop at a fixed cadence and stops on an explicit
//! [`ShutdownToken`].  The scheduler knows nothing about sensors or the
//! broker; on every tick it calls a [`TickDelegate`].
//!
//! ```text
//!   Clock ──▶ Cadence ──▶ sleep(remaining) ─┬─▶ TickDelegate::on_tick
//!                              ▲            │
//!   ShutdownToken::request ────┘ (wakes)    └─▶ next deadline += period
//! ```
//!
//! Deadlines are computed from the start time, not from "now", so the
//! cadence does not drift with tick duration.  A tick that overruns one
//! or more whole periods skips the missed deadlines instead of replaying
//! them back-to-back.

use core::cell::RefCell;
use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Poll;
use core::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use futures_lite::future::{block_on, or};
use log::{info, warn};

use crate::app::ports::{Clock, TickDelegate};

/// Tasks that may wait on one token at the same time (sampling loop,
/// link thread, and spare for tests).
pub const MAX_SHUTDOWN_WAITERS: usize = 4;

// ═══════════════════════════════════════════════════════════════
//  Shutdown token
// ═══════════════════════════════════════════════════════════════

/// Explicit cancellation shared by the loop and the publisher thread.
///
/// A request stops *future* ticks; a tick already running finishes.
/// Every waiter keeps its own waker, so waiters on different threads
/// sleep independently until [`request`](Self::request).
pub struct ShutdownToken {
    requested: AtomicBool,
    waiters: Mutex<CriticalSectionRawMutex, RefCell<MultiWakerRegistration<MAX_SHUTDOWN_WAITERS>>>,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownToken {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            waiters: Mutex::new(RefCell::new(MultiWakerRegistration::new())),
        }
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            info!("Shutdown requested");
        }
        self.waiters.lock(|w| w.borrow_mut().wake());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            if self.is_requested() {
                return Poll::Ready(());
            }
            self.waiters.lock(|w| w.borrow_mut().register(cx.waker()));
            // A request racing the registration has already set the flag.
            if self.is_requested() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cadence (pure deadline arithmetic)
// ═══════════════════════════════════════════════════════════════

/// What the scheduler should do at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Not yet; sleep this many milliseconds.
    Wait(u64),
    /// Run a tick now; `skipped` whole periods were missed.
    Fire { skipped: u64 },
}

#[derive(Debug, Clone)]
pub struct Cadence {
    period_ms: u64,
    next_ms: u64,
}

impl Cadence {
    /// First tick fires at `start_ms`.
    pub fn new(period_ms: u64, start_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_ms: start_ms,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Deadline of the next tick.
    pub fn next_ms(&self) -> u64 {
        self.next_ms
    }

    /// Check the deadline.  On `Fire` the next deadline is armed.
    pub fn poll(&mut self, now_ms: u64) -> Due {
        if now_ms < self.next_ms {
            return Due::Wait(self.next_ms - now_ms);
        }
        let skipped = (now_ms - self.next_ms) / self.period_ms;
        self.next_ms += (skipped + 1) * self.period_ms;
        Due::Fire { skipped }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Counters returned when the scheduler stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub skipped: u64,
}

pub struct Scheduler {
    period_ms: u64,
}

impl Scheduler {
    pub fn new(period_ms: u32) -> Self {
        Self {
            period_ms: u64::from(period_ms.max(1)),
        }
    }

    /// Block the calling thread until `shutdown` is requested.
    pub fn run(
        &self,
        clock: &impl Clock,
        shutdown: &ShutdownToken,
        delegate: &mut impl TickDelegate,
    ) -> RunSummary {
        block_on(self.run_async(clock, shutdown, delegate))
    }

    pub async fn run_async(
        &self,
        clock: &impl Clock,
        shutdown: &ShutdownToken,
        delegate: &mut impl TickDelegate,
    ) -> RunSummary {
        let mut cadence = Cadence::new(self.period_ms, clock.now_ms());
        let mut summary = RunSummary::default();
        info!("Scheduler: started, period {}ms", self.period_ms);

        while !shutdown.is_requested() {
            let now = clock.now_ms();
            match cadence.poll(now) {
                Due::Wait(ms) => {
                    or(
                        async {
                            async_io_mini::Timer::after(Duration::from_millis(ms)).await;
                        },
                        shutdown.wait(),
                    )
                    .await;
                }
                Due::Fire { skipped } => {
                    if skipped > 0 {
                        warn!(
                            "Scheduler: tick overran, skipping {} missed tick(s)",
                            skipped
                        );
                        summary.skipped += skipped;
                    }
                    summary.ticks += 1;
                    delegate.on_tick(summary.ticks, now);
                }
            }
        }

        info!(
            "Scheduler: stopped after {} tick(s), {} skipped",
            summary.ticks, summary.skipped
        );
        summary
    }
}
