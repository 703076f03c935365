// packages/tracker/src/main.rs
//! Session Tracker
//!
//! Records newline-delimited JSON events from stdin and delivers them to the
//! configured collection endpoint. Control lines:
//!
//! - `!toggle`: pause or resume recording
//! - `!flush`: flush immediately
//! - `!stop`: stop and forget the session
//!
//! Lines that are not valid JSON are recorded as `{"type": "log", "message": ...}`.

use anyhow::Result;
use serde_json::{json, Value};
use session_tracker::observability::init_tracing;
use session_tracker::{ManualCapture, SessionTracker, ToggleSurface, TrackerConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting Session Tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::load_from(path)?,
        None => TrackerConfig::load()?,
    };
    info!("Configuration loaded: {:?}", config);

    let capture = ManualCapture::new();
    let tracker = SessionTracker::builder(config, Arc::new(capture.clone()))
        .on_error(|e| warn!("Delivery failed: {}", e))
        .build()?;
    tracker.start();

    info!(
        session_id = %tracker.session_id(),
        recording = tracker.is_recording(),
        "Tracker ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stopped = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if handle_line(&tracker, &capture, line.trim()).await {
                            stopped = true;
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, flushing...");
                break;
            }
        }
    }

    if !stopped {
        // exiting is an unload, not a stop: the session stays resumable
        let outcome = tracker.flush().await;
        info!("Final flush: {:?}", outcome);
    }

    let stats = tracker.stats();
    info!(
        "Delivered {} events in {} batches ({} failed attempts, {} dropped)",
        stats.events_delivered, stats.batches_delivered, stats.failed_attempts, stats.buffer.dropped
    );

    Ok(())
}

/// Handle one input line; returns true when the tracker was stopped
async fn handle_line(tracker: &SessionTracker, capture: &ManualCapture, line: &str) -> bool {
    match line {
        "" => false,
        "!toggle" => {
            let state = ToggleSurface::toggle(tracker).await;
            info!("Recording {}", state);
            false
        }
        "!flush" => {
            let outcome = tracker.flush().await;
            info!("Flush: {:?}", outcome);
            false
        }
        "!stop" => {
            tracker.stop().await;
            true
        }
        _ => {
            let event = serde_json::from_str::<Value>(line)
                .unwrap_or_else(|_| json!({ "type": "log", "message": line }));
            if !capture.emit(event) {
                info!("Not recording, event discarded");
            }
            false
        }
    }
}
