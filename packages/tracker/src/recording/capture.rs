// packages/tracker/src/recording/capture.rs
//! Capture adapter seam
//!
//! The tracker does not know how events are produced. A [`CaptureAdapter`]
//! is started with a sink and produces events into it until its
//! [`StopHandle`] is invoked.

use crate::recording::event::Event;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Callback receiving every captured event
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// Source of captured events
pub trait CaptureAdapter: Send + Sync {
    /// Begin producing events into `sink`.
    ///
    /// `checkpoint_interval` is how often the adapter should emit a full
    /// snapshot so a replay can start from any checkpoint.
    fn start_capture(
        &self,
        sink: EventSink,
        checkpoint_interval: Duration,
    ) -> Result<Box<dyn StopHandle>>;
}

/// Stops a running capture
pub trait StopHandle: Send {
    fn stop(self: Box<Self>);
}

#[derive(Default)]
struct ManualSlot {
    sink: Option<EventSink>,
    generation: u64,
    checkpoint_interval: Option<Duration>,
}

/// Capture adapter fed by the host through [`ManualCapture::emit`].
///
/// Events emitted while no capture is running are discarded, so the
/// recording state gates event generation.
#[derive(Clone, Default)]
pub struct ManualCapture {
    slot: Arc<Mutex<ManualSlot>>,
}

impl ManualCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward an event to the running capture; returns false when stopped
    pub fn emit(&self, event: impl Into<Event>) -> bool {
        // clone the sink so it is not called under the lock
        let sink = self.slot.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink(event.into());
                true
            }
            None => false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.slot.lock().sink.is_some()
    }

    /// Interval requested by the most recent `start_capture`
    pub fn checkpoint_interval(&self) -> Option<Duration> {
        self.slot.lock().checkpoint_interval
    }
}

impl CaptureAdapter for ManualCapture {
    fn start_capture(
        &self,
        sink: EventSink,
        checkpoint_interval: Duration,
    ) -> Result<Box<dyn StopHandle>> {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.sink = Some(sink);
        slot.checkpoint_interval = Some(checkpoint_interval);
        debug!("Manual capture started (generation {})", slot.generation);

        Ok(Box::new(ManualStop {
            slot: Arc::clone(&self.slot),
            generation: slot.generation,
        }))
    }
}

struct ManualStop {
    slot: Arc<Mutex<ManualSlot>>,
    generation: u64,
}

impl StopHandle for ManualStop {
    fn stop(self: Box<Self>) {
        let mut slot = self.slot.lock();
        // a newer capture owns the slot now
        if slot.generation == self.generation {
            slot.sink = None;
            debug!("Manual capture stopped (generation {})", self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collecting_sink() -> (EventSink, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: EventSink = Arc::new(move |event| sink_seen.lock().push(event));
        (sink, seen)
    }

    #[test]
    fn test_emit_without_capture_is_dropped() {
        let capture = ManualCapture::new();
        assert!(!capture.emit(json!({"type": "click"})));
    }

    #[test]
    fn test_emit_reaches_sink_until_stopped() {
        let capture = ManualCapture::new();
        let (sink, seen) = collecting_sink();

        let handle = capture
            .start_capture(sink, Duration::from_secs(30))
            .unwrap();
        assert!(capture.is_capturing());
        assert_eq!(capture.checkpoint_interval(), Some(Duration::from_secs(30)));
        assert!(capture.emit(json!({"type": "click"})));

        handle.stop();
        assert!(!capture.emit(json!({"type": "scroll"})));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_stale_handle_does_not_stop_newer_capture() {
        let capture = ManualCapture::new();
        let (first_sink, _) = collecting_sink();
        let (second_sink, seen) = collecting_sink();

        let stale = capture
            .start_capture(first_sink, Duration::from_secs(30))
            .unwrap();
        let _current = capture
            .start_capture(second_sink, Duration::from_secs(30))
            .unwrap();

        stale.stop();
        assert!(capture.emit(json!({"type": "input"})));
        assert_eq!(seen.lock().len(), 1);
    }
}
