// packages/tracker/src/lib.rs
//! Session Tracker Library
//!
//! A client-side session telemetry agent. It resolves a session identity that
//! survives restarts, records events from a pluggable capture adapter while
//! recording is active, and delivers them in batches to a collection endpoint
//! without ever surfacing a failure to the host application.
//!
//! # Architecture
//!
//! - **session**: persistent session store and identity manager
//! - **recording**: recording state machine, event buffer, capture seam
//! - **delivery**: batching, timeout-bounded HTTP delivery, retry policy
//! - **widget**: toggle surface for a visible recording control
//! - **observability**: tracing setup and metric names
//! - **utils**: configuration, errors, clock
//!
//! # Example
//!
//! ```rust,no_run
//! use session_tracker::{ManualCapture, TrackerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let capture = ManualCapture::new();
//!     let config = TrackerConfig::new("http://localhost:3001/api");
//!
//!     if let Some(tracker) = session_tracker::init(config, Arc::new(capture.clone())) {
//!         capture.emit(serde_json::json!({"type": "click", "x": 10, "y": 20}));
//!         tracker.stop().await;
//!     }
//! }
//! ```

pub mod delivery;
pub mod observability;
pub mod recording;
pub mod session;
pub mod utils;
pub mod widget;

use std::sync::Arc;

// Re-export commonly used types
pub use delivery::{DeliveryEngine, DeliveryStats, FlushOutcome, HttpTransport, Transport};
pub use recording::{
    CaptureAdapter, Event, ManualCapture, RecordingState, SessionTracker, TrackerBuilder,
    UnloadSignal,
};
pub use session::{MemoryStore, Session, SessionStore, SqliteStore};
pub use utils::config::TrackerConfig;
pub use utils::errors::{Result, TrackerError};
pub use widget::{ToggleSurface, WidgetAppearance, WidgetView};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

/// Construct a tracker and start it.
///
/// Returns `None` if the tracker cannot be constructed; the failure is logged
/// and never propagated.
pub fn init(config: TrackerConfig, capture: Arc<dyn CaptureAdapter>) -> Option<SessionTracker> {
    SessionTracker::builder(config, capture).init()
}
