// packages/tracker/src/observability/mod.rs
//! Logging and metrics
//!
//! The library only emits `tracing` events and `metrics` counters; installing
//! a subscriber or recorder is left to the host. [`init_tracing`] is provided
//! for binaries that have no logging setup of their own.

use crate::utils::errors::{Result, TrackerError};
use tracing_subscriber::EnvFilter;

/// Counter: events accepted into the buffer
pub const EVENTS_ENQUEUED: &str = "session_tracker_events_enqueued_total";

/// Counter: batches accepted by the endpoint
pub const BATCHES_DELIVERED: &str = "session_tracker_batches_delivered_total";

/// Counter: events accepted by the endpoint
pub const EVENTS_DELIVERED: &str = "session_tracker_events_delivered_total";

/// Counter: failed delivery attempts
pub const DELIVERY_FAILURES: &str = "session_tracker_delivery_failures_total";

/// Counter: events discarded by the retry policy
pub const EVENTS_DROPPED: &str = "session_tracker_events_dropped_total";

/// Gauge: events currently buffered
pub const BUFFERED_EVENTS: &str = "session_tracker_buffered_events";

/// Environment variable selecting JSON log output
pub const LOG_FORMAT_ENV: &str = "SESSION_TRACKER_LOG_FORMAT";

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    result.map_err(|e| TrackerError::ObservabilityFailed(e.to_string()))
}
