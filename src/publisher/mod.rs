//! Best-effort MQTT publisher.
//!
//! ```text
//!  sampling loop                         link thread
//!  ─────────────                         ───────────
//!  Publisher::publish ──▶ Outbox ──▶ Link::service ──▶ BrokerPort
//!        │               (Mutex)          ▲
//!        └──── wake Signal ───────────────┘
//! ```
//!
//! `publish` never touches the network; it takes a short mutex and
//! returns.  The link thread owns the broker client and drains the
//! per-topic bounded queues, reconnecting with capped exponential backoff.

pub mod backoff;
pub mod link;
pub mod outbox;

use core::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::app::ports::{BrokerPort, Clock, PublishPort};
use crate::config::Config;
use crate::error::BrokerError;
use crate::scheduler::ShutdownToken;

pub use link::Link;
pub use outbox::{Outbox, Payload, QUEUE_DEPTH};

const LINK_STACK_SIZE: usize = 8 * 1024;

// ── Topics ────────────────────────────────────────────────────

/// Every topic the monitor publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Topic {
    Co2 = 0,
    Temperature = 1,
    Pressure = 2,
    Humidity = 3,
    Alert = 4,
}

impl Topic {
    pub const COUNT: usize = 5;
    pub const ALL: [Topic; Topic::COUNT] = [
        Topic::Co2,
        Topic::Temperature,
        Topic::Pressure,
        Topic::Humidity,
        Topic::Alert,
    ];

    /// Last topic segment.
    pub fn metric(self) -> &'static str {
        match self {
            Self::Co2 => "co2_ppm",
            Self::Temperature => "temperature_c",
            Self::Pressure => "pressure_hpa",
            Self::Humidity => "humidity_pct",
            Self::Alert => "co2_alert",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Full topic paths, `{prefix}/{room}/{metric}`, built once at startup.
#[derive(Debug, Clone)]
pub struct Topics {
    paths: [String; Topic::COUNT],
}

impl Topics {
    /// `prefix` and `room` must already be sanitised
    /// (see [`sanitize_segment`](crate::config::sanitize_segment)).
    pub fn new(prefix: &str, room: &str) -> Self {
        Self {
            paths: core::array::from_fn(|i| {
                format!("{}/{}/{}", prefix, room, Topic::ALL[i].metric())
            }),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.topic_prefix, &cfg.room_name)
    }

    pub fn path(&self, topic: Topic) -> &str {
        &self.paths[topic.index()]
    }
}

// ── Payload formatting ────────────────────────────────────────

/// CO2 as a plain integer.
pub fn format_ppm(ppm: u16) -> Payload {
    let mut s = Payload::new();
    // A u16 always fits.
    let _ = write!(s, "{}", ppm);
    s
}

/// Climate values with two decimals.
pub fn format_decimal(value: f32) -> Payload {
    let mut s = Payload::new();
    // Longest finite f32 with two decimals is well under PAYLOAD_CAP.
    let _ = write!(s, "{:.2}", value);
    s
}

// ── Shared state ──────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct Stats {
    pub(crate) queued: AtomicU32,
    pub(crate) published: AtomicU32,
    pub(crate) dropped: AtomicU32,
    pub(crate) connect_attempts: AtomicU32,
    pub(crate) connected: AtomicBool,
}

/// Point-in-time copy of the publisher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublisherStats {
    pub queued: u32,
    pub published: u32,
    /// Oldest-dropped on overflow plus unsent payloads that could not be requeued.
    pub dropped: u32,
    pub connect_attempts: u32,
    pub connected: bool,
    pub pending: usize,
}

pub(crate) struct Shared {
    outbox: Mutex<Outbox>,
    pub(crate) stats: Stats,
    /// Doorbell rung on every enqueue.
    pub(crate) wake: Signal<CriticalSectionRawMutex, ()>,
}

impl Shared {
    fn new() -> Self {
        Self {
            outbox: Mutex::new(Outbox::new()),
            stats: Stats::default(),
            wake: Signal::new(),
        }
    }

    /// The outbox holds plain data, so a panic elsewhere cannot leave it
    /// inconsistent; recover from poisoning.
    pub(crate) fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What happened to a payload handed to [`Publisher::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Queued,
    /// Queued, but the topic's queue was full and its oldest entry was dropped.
    QueuedDroppedOldest,
}

// ── Publisher handle ──────────────────────────────────────────

/// Cheap, cloneable handle used by the sampling loop.
#[derive(Clone)]
pub struct Publisher {
    shared: Arc<Shared>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Build a link bound to this publisher's outbox without starting a
    /// thread.  The caller drives [`Link::service`].
    pub fn link<B: BrokerPort>(&self, broker: B, topics: Topics) -> Link<B> {
        Link::new(broker, topics, self.shared.clone())
    }

    /// Start the link task on its own thread.  It exits once `shutdown`
    /// is requested, after one final drain attempt.
    pub fn spawn<B, K>(
        &self,
        broker: B,
        topics: Topics,
        clock: K,
        shutdown: Arc<ShutdownToken>,
    ) -> std::io::Result<JoinHandle<()>>
    where
        B: BrokerPort + 'static,
        K: Clock + Send + 'static,
    {
        let link = self.link(broker, topics);
        let handle = std::thread::Builder::new()
            .name("mqtt-link".into())
            .stack_size(LINK_STACK_SIZE)
            .spawn(move || run_link_thread(link, clock, shutdown))?;
        info!("Publisher: link thread spawned");
        Ok(handle)
    }

    pub fn stats(&self) -> PublisherStats {
        let s = &self.shared.stats;
        PublisherStats {
            queued: s.queued.load(Ordering::Relaxed),
            published: s.published.load(Ordering::Relaxed),
            dropped: s.dropped.load(Ordering::Relaxed),
            connect_attempts: s.connect_attempts.load(Ordering::Relaxed),
            connected: s.connected.load(Ordering::Relaxed),
            pending: self.shared.lock_outbox().total_len(),
        }
    }

    /// Payloads waiting for `topic`.
    pub fn pending(&self, topic: Topic) -> usize {
        self.shared.lock_outbox().len(topic)
    }
}

impl PublishPort for Publisher {
    fn publish(&self, topic: Topic, payload: &str) -> Result<PublishOutcome, BrokerError> {
        let payload = Payload::try_from(payload).map_err(|_| BrokerError::PayloadTooLarge)?;
        let outcome = self.shared.lock_outbox().push(topic, payload);
        self.shared.stats.queued.fetch_add(1, Ordering::Relaxed);
        if outcome == PublishOutcome::QueuedDroppedOldest {
            self.shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Publisher: {} queue full, dropped oldest payload",
                topic.metric()
            );
        }
        self.shared.wake.signal(());
        Ok(outcome)
    }
}

/// Thread entry: a single-task executor driven by `futures-lite`, with
/// `async-io-mini` providing the timers.
fn run_link_thread<B: BrokerPort, K: Clock>(link: Link<B>, clock: K, shutdown: Arc<ShutdownToken>) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let task = executor.spawn(link::run(link, clock, shutdown));
    futures_lite::future::block_on(executor.run(task));
}
