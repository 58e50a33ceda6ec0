//! Per-topic bounded queues of pending payloads.
//!
//! Each topic gets its own `heapless::Deque`.  When a queue is full the
//! oldest payload is discarded: for periodic telemetry the newest value
//! is the one worth delivering.

use heapless::{Deque, String, Vec};

use super::{PublishOutcome, Topic};

/// Pending payloads kept per topic while the broker is unreachable.
pub const QUEUE_DEPTH: usize = 8;

/// Largest payload accepted (the alert JSON is the longest).
pub const PAYLOAD_CAP: usize = 128;

pub type Payload = String<PAYLOAD_CAP>;

/// Upper bound on what one [`Outbox::pop_batch`] hands out.
pub const BATCH: usize = Topic::COUNT * 2;

pub struct Outbox {
    queues: [Deque<Payload, QUEUE_DEPTH>; Topic::COUNT],
    /// Round-robin cursor so no topic starves the others.
    cursor: usize,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|_| Deque::new()),
            cursor: 0,
        }
    }

    /// Enqueue, dropping the oldest entry if the topic's queue is full.
    pub fn push(&mut self, topic: Topic, payload: Payload) -> PublishOutcome {
        let q = &mut self.queues[topic.index()];
        let outcome = if q.is_full() {
            q.pop_front();
            PublishOutcome::QueuedDroppedOldest
        } else {
            PublishOutcome::Queued
        };
        // Cannot fail: a slot was guaranteed above.
        let _ = q.push_back(payload);
        outcome
    }

    /// Put an unsent payload back at the head of its queue.
    ///
    /// Returns `false` (payload dropped) when newer data already filled
    /// the queue.
    pub fn requeue_front(&mut self, topic: Topic, payload: Payload) -> bool {
        self.queues[topic.index()].push_front(payload).is_ok()
    }

    /// Take up to [`BATCH`] payloads, one per topic per round.
    pub fn pop_batch(&mut self) -> Vec<(Topic, Payload), BATCH> {
        let mut out = Vec::new();
        'fill: while !out.is_full() && !self.is_empty() {
            for _ in 0..Topic::COUNT {
                if out.is_full() {
                    break 'fill;
                }
                let topic = Topic::ALL[self.cursor];
                self.cursor = (self.cursor + 1) % Topic::COUNT;
                if let Some(p) = self.queues[topic.index()].pop_front() {
                    // Cannot fail: checked for room above.
                    let _ = out.push((topic, p));
                }
            }
        }
        out
    }

    pub fn len(&self, topic: Topic) -> usize {
        self.queues[topic.index()].len()
    }

    pub fn total_len(&self) -> usize {
        self.queues.iter().map(Deque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Deque::is_empty)
    }
}
