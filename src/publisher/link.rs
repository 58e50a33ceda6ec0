//! Broker link: connection management and outbox draining.
//!
//! A [`Link`] is owned by the publisher's background thread.  Each pass
//! it makes sure a session exists (respecting the reconnect backoff) and
//! then drains the shared outbox.  The outbox lock is only held to pop or
//! requeue; the network call happens outside it.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{error, info, warn};

use crate::app::ports::{BrokerPort, Clock};
use crate::scheduler::ShutdownToken;

use super::backoff::Backoff;
use super::outbox::{Payload, QUEUE_DEPTH};
use super::{Shared, Topic, Topics};

/// Upper bound on how long the link task sleeps between passes; also the
/// worst-case shutdown latency.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Connect failures after which each further failure is logged as an error.
const LOUD_AFTER_FAILURES: u32 = 5;

/// Enough rounds to empty a completely full outbox.
const MAX_ROUNDS: usize = QUEUE_DEPTH + 1;

pub struct Link<B> {
    broker: B,
    topics: Topics,
    shared: Arc<Shared>,
    backoff: Backoff,
    up: bool,
}

impl<B: BrokerPort> Link<B> {
    pub(crate) fn new(broker: B, topics: Topics, shared: Arc<Shared>) -> Self {
        Self {
            broker,
            topics,
            shared,
            backoff: Backoff::default(),
            up: false,
        }
    }

    /// Whether the last pass left the session usable.
    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn backoff_remaining_ms(&self, now_ms: u64) -> u64 {
        self.backoff.remaining_ms(now_ms)
    }

    /// Idempotent: no-op while connected, no attempt inside the backoff
    /// window.  Returns whether the link is usable.
    pub fn ensure_connected(&mut self, now_ms: u64) -> bool {
        if self.up {
            if self.broker.is_connected() {
                return true;
            }
            warn!("Publisher: broker session lost");
            self.mark_down();
        }

        if !self.backoff.ready(now_ms) {
            return false;
        }

        self.shared
            .stats
            .connect_attempts
            .fetch_add(1, Ordering::Relaxed);
        match self.broker.connect() {
            Ok(()) => {
                if self.backoff.failures() > 0 {
                    info!(
                        "Publisher: connected after {} failed attempt(s)",
                        self.backoff.failures()
                    );
                } else {
                    info!("Publisher: connected");
                }
                self.backoff.on_success();
                self.up = true;
                self.shared.stats.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let wait = self.backoff.on_failure(now_ms);
                if self.backoff.failures() >= LOUD_AFTER_FAILURES {
                    error!(
                        "Publisher: connect failed ({}), attempt {}, retry in {}ms",
                        e,
                        self.backoff.failures(),
                        wait
                    );
                } else {
                    warn!("Publisher: connect failed ({}), retry in {}ms", e, wait);
                }
                false
            }
        }
    }

    /// One pass: connect if needed, then drain.  Returns payloads sent.
    pub fn service(&mut self, now_ms: u64) -> usize {
        if !self.ensure_connected(now_ms) {
            return 0;
        }

        let mut sent = 0;
        for _ in 0..MAX_ROUNDS {
            let batch = self.shared.lock_outbox().pop_batch();
            if batch.is_empty() {
                break;
            }
            for (i, (topic, payload)) in batch.iter().enumerate() {
                let path = self.topics.path(*topic);
                match self.broker.publish(path, payload.as_bytes()) {
                    Ok(()) => {
                        sent += 1;
                        self.shared.stats.published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("Publisher: publish to {} failed ({})", path, e);
                        self.mark_down();
                        self.requeue(&batch[i..]);
                        return sent;
                    }
                }
            }
        }
        sent
    }

    fn mark_down(&mut self) {
        self.up = false;
        self.shared.stats.connected.store(false, Ordering::Relaxed);
    }

    /// Return unsent items to the front of their queues, oldest first.
    fn requeue(&self, items: &[(Topic, Payload)]) {
        let mut outbox = self.shared.lock_outbox();
        for (topic, payload) in items.iter().rev() {
            if !outbox.requeue_front(*topic, payload.clone()) {
                self.shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Publisher: dropping unsent {} payload, newer data queued",
                    topic.metric()
                );
            }
        }
    }
}

/// Link task body: service, then sleep until woken, polled, or stopped.
pub(crate) async fn run<B: BrokerPort, K: Clock>(
    mut link: Link<B>,
    clock: K,
    shutdown: Arc<ShutdownToken>,
) {
    use futures_lite::future::or;

    info!("Publisher: link task started");
    let shared = link.shared.clone();
    while !shutdown.is_requested() {
        link.service(clock.now_ms());
        or(
            or(shared.wake.wait(), async {
                async_io_mini::Timer::after(POLL_INTERVAL).await;
            }),
            shutdown.wait(),
        )
        .await;
    }
    // Last chance for anything queued while stopping.
    link.service(clock.now_ms());
    info!("Publisher: link task stopped");
}
