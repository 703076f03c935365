// packages/tracker/src/utils/errors.rs
//! Error types and the containment policy for the public surface
//!
//! Internal code propagates [`TrackerError`] with `?`. Anything that crosses
//! into the host application (lifecycle transitions, capture adapters, user
//! callbacks) goes through [`contain`], which logs and swallows both errors
//! and panics.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Tracker errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("Transport error: {0}")]
    TransportFailed(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Delivery timed out after {0:?}")]
    DeliveryTimeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Observability setup failed: {0}")]
    ObservabilityFailed(String),
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::StoreUnavailable(err.to_string())
    }
}

impl From<config::ConfigError> for TrackerError {
    fn from(err: config::ConfigError) -> Self {
        TrackerError::ConfigError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Run `f`, logging and discarding any error or panic it produces.
///
/// Returns `None` when `f` failed in either way.
pub fn contain<T>(operation: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("Failed to {}: {}", operation, e);
            None
        }
        Err(panic) => {
            warn!("Failed to {}: panicked ({})", operation, panic_message(panic.as_ref()));
            None
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
