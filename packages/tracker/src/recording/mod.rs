// packages/tracker/src/recording/mod.rs
//! Event recording
//!
//! - **Tracker**: recording state machine, periodic flush and unload hook
//! - **Buffer**: ordered event buffer and retry policy
//! - **Capture**: adapter seam producing events
//! - **Event**: opaque event record
//! - **State**: active/inactive recording state
//!
//! # Architecture
//!
//! ```text
//! CaptureAdapter ──► sink ──► DeliveryEngine::enqueue ──► EventBuffer
//!                      │
//!                      └────► SessionIdentity::touch
//!
//! flush task (every flush_interval) ─┐
//! unload hook (UnloadSignal)         ├──► DeliveryEngine::flush
//! pause() / stop()                   ┘
//! ```
//!
//! # States
//!
//! ```text
//!             start() [opt-in: only after resume()]
//!  Inactive ────────────────────────────────────────► Active
//!     ▲  ◄──────────────── pause() ──────────────────   │
//!     │                                                 │
//!     └──────────── stop() (terminal) ◄─────────────────┘
//! ```

pub mod buffer;
pub mod capture;
pub mod event;
pub mod state;
pub mod tracker;

// Re-export commonly used types
pub use buffer::{BufferStats, EventBuffer, RetryDecision, RetryPolicy, MAX_BACKLOG, MAX_FAILURES};
pub use capture::{CaptureAdapter, EventSink, ManualCapture, StopHandle};
pub use event::Event;
pub use state::RecordingState;
pub use tracker::{SessionTracker, TrackerBuilder, UnloadSignal};
