// packages/tracker/src/delivery/engine.rs
//! Event buffer & delivery engine
//!
//! Owns the tracker's [`EventBuffer`]. `enqueue` is synchronous and never
//! fails; `flush` detaches the buffer, sends it with a bounded timeout and
//! applies the [`RetryPolicy`] on failure. Flushes are serialised: a flush
//! requested while another is in flight waits for it to finish.

use crate::delivery::payload::EventBatch;
use crate::delivery::transport::Transport;
use crate::observability;
use crate::recording::buffer::{BufferStats, EventBuffer, RetryDecision, RetryPolicy};
use crate::recording::event::Event;
use crate::utils::errors::{contain, Result, TrackerError};
use crate::utils::now_millis;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use ulid::Ulid;

/// Upper bound on a single delivery request
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Observer invoked with every delivery failure
pub type ErrorCallback = Arc<dyn Fn(&TrackerError) + Send + Sync>;

/// Result of one flush call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered
    Empty,

    /// The batch was accepted by the endpoint
    Delivered { events: usize },

    /// Delivery failed; `failures` is the failure count after this attempt
    Failed {
        events: usize,
        failures: u32,
        decision: RetryDecision,
    },
}

impl FlushOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered { .. })
    }
}

/// Delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub batches_delivered: u64,
    pub events_delivered: u64,
    pub failed_attempts: u64,
    pub buffer: BufferStats,
}

/// Buffers events and delivers them to `{endpoint}/sessions/{id}/events`
pub struct DeliveryEngine {
    url: String,
    session_id: String,
    metadata: Map<String, Value>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    request_timeout: Duration,
    on_error: Option<ErrorCallback>,

    buffer: parking_lot::Mutex<EventBuffer>,

    /// Serialises flushes
    flush_lock: tokio::sync::Mutex<()>,

    failures: AtomicU32,
    batches_delivered: AtomicU64,
    events_delivered: AtomicU64,
}

impl DeliveryEngine {
    pub fn new(
        endpoint: &str,
        session_id: impl Into<String>,
        metadata: Map<String, Value>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let session_id = session_id.into();
        let url = format!(
            "{}/sessions/{}/events",
            endpoint.trim_end_matches('/'),
            session_id
        );

        Self {
            url,
            session_id,
            metadata,
            transport,
            policy: RetryPolicy::default(),
            request_timeout: REQUEST_TIMEOUT,
            on_error: None,
            buffer: parking_lot::Mutex::new(EventBuffer::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            failures: AtomicU32::new(0),
            batches_delivered: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_error_callback(mut self, on_error: Option<ErrorCallback>) -> Self {
        self.on_error = on_error;
        self
    }

    /// Append a captured event
    pub fn enqueue(&self, event: Event) {
        let len = {
            let mut buffer = self.buffer.lock();
            buffer.enqueue(event);
            buffer.len()
        };
        metrics::counter!(observability::EVENTS_ENQUEUED).increment(1);
        metrics::gauge!(observability::BUFFERED_EVENTS).set(len as f64);
    }

    /// Detach the buffer and attempt delivery.
    ///
    /// Never returns an error; failures are counted, reported to the error
    /// callback and handed to the retry policy.
    pub async fn flush(&self) -> FlushOutcome {
        let _serialised = self.flush_lock.lock().await;

        let batch = self.buffer.lock().detach();
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let attempt = Ulid::new();
        let events = batch.len();
        let started = Instant::now();
        debug!(session_id = %self.session_id, %attempt, "Flushing {} events", events);

        match self.deliver(&batch).await {
            Ok(()) => {
                self.batches_delivered.fetch_add(1, Ordering::Relaxed);
                self.events_delivered.fetch_add(events as u64, Ordering::Relaxed);
                metrics::counter!(observability::BATCHES_DELIVERED).increment(1);
                metrics::counter!(observability::EVENTS_DELIVERED).increment(events as u64);

                debug!(%attempt, "Delivered {} events in {:?}", events, started.elapsed());
                FlushOutcome::Delivered { events }
            }
            Err(err) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::counter!(observability::DELIVERY_FAILURES).increment(1);
                warn!(
                    session_id = %self.session_id,
                    %attempt,
                    failures,
                    "Failed to send {} events: {}",
                    events,
                    err
                );

                self.notify_error(&err);

                let (decision, len) = {
                    let mut buffer = self.buffer.lock();
                    let decision = self.policy.apply(&mut buffer, batch, failures);
                    (decision, buffer.len())
                };

                metrics::counter!(observability::EVENTS_DROPPED).increment(decision.dropped() as u64);
                metrics::gauge!(observability::BUFFERED_EVENTS).set(len as f64);
                if let RetryDecision::Abandoned { dropped } = decision {
                    warn!(
                        session_id = %self.session_id,
                        "Giving up after {} failures, dropped {} events",
                        failures,
                        dropped
                    );
                }

                FlushOutcome::Failed {
                    events,
                    failures,
                    decision,
                }
            }
        }
    }

    async fn deliver(&self, batch: &[Event]) -> Result<()> {
        let body = serde_json::to_vec(&EventBatch {
            events: batch,
            timestamp: now_millis(),
            metadata: &self.metadata,
        })?;

        let status = tokio::time::timeout(
            self.request_timeout,
            self.transport.post(&self.url, Bytes::from(body)),
        )
        .await
        .map_err(|_| TrackerError::DeliveryTimeout(self.request_timeout))??;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(TrackerError::HttpStatus(status))
        }
    }

    fn notify_error(&self, err: &TrackerError) {
        if let Some(on_error) = &self.on_error {
            contain("run error callback", || {
                on_error(err);
                Ok(())
            });
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Pending events, oldest first
    pub fn buffered_events(&self) -> Vec<Event> {
        self.buffer.lock().snapshot()
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            failed_attempts: u64::from(self.failure_count()),
            buffer: self.buffer.lock().stats(),
        }
    }
}
