// packages/tracker/src/recording/buffer.rs
//! Event buffer and retry policy
//!
//! The buffer is an ordered queue of captured events awaiting delivery. A
//! flush detaches the whole queue at once; when delivery fails the
//! [`RetryPolicy`] decides whether the batch goes back to the front or the
//! backlog is abandoned.

use crate::recording::event::Event;
use std::collections::VecDeque;

/// Failures after which the backlog is abandoned
pub const MAX_FAILURES: u32 = 3;

/// Upper bound on the backlog retained for retry
pub const MAX_BACKLOG: usize = 1000;

/// Ordered buffer of undelivered events
#[derive(Debug, Default)]
pub struct EventBuffer {
    /// Pending events, oldest first
    events: VecDeque<Event>,

    /// Buffer counters
    stats: BufferStats,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the tail
    pub fn enqueue(&mut self, event: Event) {
        self.events.push_back(event);
        self.stats.enqueued += 1;
    }

    /// Take every pending event, leaving a fresh empty buffer behind
    pub fn detach(&mut self) -> Vec<Event> {
        let batch: Vec<Event> = std::mem::take(&mut self.events).into();
        self.stats.detached += batch.len() as u64;
        batch
    }

    /// Put `events` back in front of whatever was captured since the detach
    pub fn requeue_front(&mut self, events: Vec<Event>) {
        self.stats.requeued += events.len() as u64;
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
    }

    /// Drop every pending event; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        self.stats.dropped += dropped as u64;
        dropped
    }

    /// Record events discarded without ever reaching the buffer again
    fn record_dropped(&mut self, count: usize) {
        self.stats.dropped += count as u64;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clone of the pending events, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats.clone()
    }
}

/// Buffer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Events accepted by `enqueue`
    pub enqueued: u64,

    /// Events handed to a flush
    pub detached: u64,

    /// Events put back after a failed flush
    pub requeued: u64,

    /// Events discarded by the retry policy
    pub dropped: u64,
}

/// What the retry policy did with a failed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// `requeued` events went back to the front; `dropped` did not fit
    Requeued { requeued: usize, dropped: usize },

    /// Failure ceiling reached; the batch and the whole buffer were dropped
    Abandoned { dropped: usize },
}

impl RetryDecision {
    pub fn dropped(&self) -> usize {
        match *self {
            RetryDecision::Requeued { dropped, .. } => dropped,
            RetryDecision::Abandoned { dropped } => dropped,
        }
    }
}

/// Failure-count gated retry with a bounded backlog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failure count at which the backlog is abandoned
    pub max_failures: u32,

    /// Re-queueing never grows the buffer past this many events
    pub max_backlog: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_failures: MAX_FAILURES,
            max_backlog: MAX_BACKLOG,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_failures: u32, max_backlog: usize) -> Self {
        Self {
            max_failures,
            max_backlog,
        }
    }

    /// Apply the policy after the `failures`-th failed delivery of `failed`.
    ///
    /// Below the ceiling, the oldest events of the batch are placed back in
    /// front of the buffer, as many as fit under `max_backlog`. At or above
    /// the ceiling the buffer is cleared.
    pub fn apply(&self, buffer: &mut EventBuffer, failed: Vec<Event>, failures: u32) -> RetryDecision {
        if failures >= self.max_failures {
            let dropped = failed.len() + buffer.clear();
            buffer.record_dropped(failed.len());
            return RetryDecision::Abandoned { dropped };
        }

        let room = self.max_backlog.saturating_sub(buffer.len());
        let mut requeue = failed;
        let overflow = requeue.len().saturating_sub(room);
        requeue.truncate(requeue.len() - overflow);

        let requeued = requeue.len();
        buffer.requeue_front(requeue);
        buffer.record_dropped(overflow);

        RetryDecision::Requeued {
            requeued,
            dropped: overflow,
        }
    }
}
