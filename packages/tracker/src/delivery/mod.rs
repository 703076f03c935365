// packages/tracker/src/delivery/mod.rs
//! Event delivery
//!
//! - **Engine**: buffering, serialised flushes, timeout and retry policy
//! - **Payload**: request body and session metadata
//! - **Transport**: HTTP POST to the collection endpoint
//!
//! # Flush
//!
//! ```text
//! enqueue() ──► EventBuffer
//!                   │ detach (fresh buffer for new captures)
//!                   ▼
//!      POST {endpoint}/sessions/{id}/events   (5s timeout)
//!                   │
//!          2xx ─────┴───── failure
//!           │                 │ failures += 1, on_error()
//!        discard              ▼
//!                   RetryPolicy: requeue front | abandon backlog
//! ```

pub mod engine;
pub mod payload;
pub mod transport;

pub use engine::{DeliveryEngine, DeliveryStats, ErrorCallback, FlushOutcome, REQUEST_TIMEOUT};
pub use payload::{session_metadata, EventBatch, ReceivedBatch};
pub use transport::{HttpTransport, Transport};
