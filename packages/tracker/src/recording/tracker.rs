// packages/tracker/src/recording/tracker.rs
//! Session tracker: recording state machine
//!
//! Ties the pieces together: the identity resolved at construction, the
//! capture adapter feeding the delivery engine, the periodic flush task and
//! the unload hook. All lifecycle methods are best-effort; failures are
//! logged and never reach the caller.

use crate::delivery::engine::{DeliveryEngine, DeliveryStats, ErrorCallback, FlushOutcome};
use crate::delivery::payload::session_metadata;
use crate::delivery::transport::{HttpTransport, Transport};
use crate::recording::capture::{CaptureAdapter, EventSink, StopHandle};
use crate::recording::state::RecordingState;
use crate::session::identity::{Session, SessionIdentity};
use crate::session::store::{SessionStore, SqliteStore};
use crate::utils::config::TrackerConfig;
use crate::utils::errors::{contain, Result, TrackerError};
use crate::utils::now_millis;
use crate::widget::{LogView, ToggleSurface, Widget, WidgetView};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Host-triggered "about to exit" signal; each trigger flushes the buffer
#[derive(Clone, Default)]
pub struct UnloadSignal {
    notify: Arc<Notify>,
}

impl UnloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a flush from the owning tracker's unload hook
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Cancels the flush task and unload hook when dropped
struct TaskGuard {
    cancel: CancellationToken,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Default)]
struct Lifecycle {
    state: RecordingState,

    /// A `resume()` has happened; lifts opt-in suppression for `start()`
    explicitly_activated: bool,

    /// `stop()` has run; terminal
    stopped: bool,

    capture: Option<Box<dyn StopHandle>>,
    tasks: Option<TaskGuard>,
}

/// Builder for [`SessionTracker`]
pub struct TrackerBuilder {
    config: TrackerConfig,
    capture: Arc<dyn CaptureAdapter>,
    store: Option<Arc<dyn SessionStore>>,
    transport: Option<Arc<dyn Transport>>,
    on_error: Option<ErrorCallback>,
    widget_view: Option<Box<dyn WidgetView>>,
    unload: Option<UnloadSignal>,
}

impl TrackerBuilder {
    /// Session store; overrides `store_path`
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Observer for delivery failures; panics inside it are swallowed
    pub fn on_error(mut self, on_error: impl Fn(&TrackerError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// View for the toggle widget (defaults to [`LogView`])
    pub fn widget_view(mut self, view: Box<dyn WidgetView>) -> Self {
        self.widget_view = Some(view);
        self
    }

    pub fn unload_signal(mut self, signal: UnloadSignal) -> Self {
        self.unload = Some(signal);
        self
    }

    /// Validate the configuration, resolve the session and assemble the tracker
    pub fn build(self) -> Result<SessionTracker> {
        let config = self.config;
        config.validate()?;

        let store = self.store.or_else(|| open_configured_store(&config));
        let identity = Arc::new(SessionIdentity::resolve(
            store,
            config.session_timeout(),
            config.session_id.as_deref(),
        ));

        let metadata = session_metadata(&config, now_millis());
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));

        let engine = Arc::new(
            DeliveryEngine::new(
                config.endpoint_base(),
                identity.session_id(),
                metadata,
                transport,
            )
            .with_error_callback(self.on_error),
        );

        let widget = config.show_widget().then(|| {
            let view = self.widget_view.unwrap_or_else(|| Box::new(LogView));
            Widget::new(view, RecordingState::Inactive)
        });

        debug!(
            session_id = %identity.session_id(),
            opt_in = config.opt_in,
            widget = widget.is_some(),
            "Tracker constructed"
        );

        Ok(SessionTracker {
            config,
            identity,
            engine,
            capture: self.capture,
            unload: self.unload.unwrap_or_default(),
            widget: Mutex::new(widget),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Build and start; `None` (with a warning) if construction fails
    pub fn init(self) -> Option<SessionTracker> {
        let tracker = contain("initialize session tracker", || self.build())?;
        tracker.start();
        Some(tracker)
    }
}

fn open_configured_store(config: &TrackerConfig) -> Option<Arc<dyn SessionStore>> {
    let path = config.store_path.as_ref()?;
    match SqliteStore::open(path) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("Failed to open session store at {:?}: {}", path, e);
            None
        }
    }
}

/// One tracking instance: session identity, recording state and delivery
pub struct SessionTracker {
    config: TrackerConfig,
    identity: Arc<SessionIdentity>,
    engine: Arc<DeliveryEngine>,
    capture: Arc<dyn CaptureAdapter>,
    unload: UnloadSignal,
    widget: Mutex<Option<Widget>>,
    lifecycle: Mutex<Lifecycle>,
}

impl SessionTracker {
    pub fn builder(config: TrackerConfig, capture: Arc<dyn CaptureAdapter>) -> TrackerBuilder {
        TrackerBuilder {
            config,
            capture,
            store: None,
            transport: None,
            on_error: None,
            widget_view: None,
            unload: None,
        }
    }

    /// Start recording. Suppressed in opt-in mode until an explicit activation.
    pub fn start(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopped {
                warn!("Tracker was stopped; construct a new one to record again");
                return;
            }
            if self.config.opt_in && !lifecycle.explicitly_activated {
                debug!("Opt-in mode: waiting for explicit activation");
                return;
            }
            if lifecycle.state.is_active() {
                return;
            }
            self.activate(&mut lifecycle);
        }
        self.refresh_widget();
    }

    /// Explicitly start recording, bypassing opt-in suppression
    pub fn resume(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopped {
                warn!("Tracker was stopped; construct a new one to record again");
                return;
            }
            if lifecycle.state.is_active() {
                return;
            }
            lifecycle.explicitly_activated = true;
            self.activate(&mut lifecycle);
        }
        self.refresh_widget();
    }

    /// Stop capture and the flush task, then flush what is buffered
    pub async fn pause(&self) {
        let (capture, tasks) = {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.state.is_active() {
                return;
            }
            lifecycle.state = RecordingState::Inactive;
            (lifecycle.capture.take(), lifecycle.tasks.take())
        };

        release(capture, tasks);
        self.refresh_widget();
        self.engine.flush().await;
        info!(session_id = %self.session_id(), "Recording paused");
    }

    /// Pause when recording, resume otherwise; returns the new state
    pub async fn toggle(&self) -> RecordingState {
        if self.is_recording() {
            self.pause().await;
        } else {
            self.resume();
        }
        self.recording_state()
    }

    /// Terminal stop: release everything, flush, and forget the session
    pub async fn stop(&self) {
        let (capture, tasks) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopped {
                return;
            }
            lifecycle.stopped = true;
            lifecycle.state = RecordingState::Inactive;
            (lifecycle.capture.take(), lifecycle.tasks.take())
        };

        release(capture, tasks);
        self.refresh_widget();
        self.engine.flush().await;
        self.identity.clear();
        info!(session_id = %self.session_id(), "Recording stopped");
    }

    /// Flush buffered events now
    pub async fn flush(&self) -> FlushOutcome {
        self.engine.flush().await
    }

    fn activate(&self, lifecycle: &mut Lifecycle) {
        if lifecycle.state.is_active() {
            return;
        }

        let Some(runtime) = contain("start recording", || {
            tokio::runtime::Handle::try_current()
                .map_err(|e| TrackerError::SchedulerUnavailable(e.to_string()))
        }) else {
            return;
        };

        let sink = self.event_sink();
        let checkpoint = self.config.checkpoint_interval();
        let Some(stop) = contain("start capture", || {
            self.capture.start_capture(sink, checkpoint)
        }) else {
            return;
        };

        let cancel = CancellationToken::new();
        runtime.spawn(flush_loop(
            Arc::clone(&self.engine),
            self.config.flush_interval(),
            cancel.clone(),
        ));
        runtime.spawn(unload_hook(
            Arc::clone(&self.engine),
            self.unload.clone(),
            cancel.clone(),
        ));

        lifecycle.capture = Some(stop);
        lifecycle.tasks = Some(TaskGuard { cancel });
        lifecycle.state = RecordingState::Active;
        info!(session_id = %self.session_id(), "Recording started");
    }

    fn event_sink(&self) -> EventSink {
        let engine = Arc::clone(&self.engine);
        let identity = Arc::clone(&self.identity);
        Arc::new(move |event| {
            engine.enqueue(event);
            identity.touch();
        })
    }

    fn refresh_widget(&self) {
        let state = self.recording_state();
        if let Some(widget) = self.widget.lock().as_ref() {
            widget.update(state);
        }
    }

    pub fn session_id(&self) -> &str {
        self.identity.session_id()
    }

    pub fn session(&self) -> Session {
        self.identity.session()
    }

    /// True when the session id is not persisted anywhere
    pub fn is_ephemeral(&self) -> bool {
        self.identity.is_ephemeral()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.lifecycle.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.recording_state().is_active()
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle.lock().stopped
    }

    pub fn failure_count(&self) -> u32 {
        self.engine.failure_count()
    }

    pub fn buffered_len(&self) -> usize {
        self.engine.buffered_len()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.engine.stats()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Signal the host triggers when it is about to exit
    pub fn unload_signal(&self) -> UnloadSignal {
        self.unload.clone()
    }

    pub fn has_widget(&self) -> bool {
        self.widget.lock().is_some()
    }

    pub fn remove_widget(&self) {
        if let Some(widget) = self.widget.lock().take() {
            widget.remove();
        }
    }
}

impl ToggleSurface for SessionTracker {
    fn recording_state(&self) -> RecordingState {
        SessionTracker::recording_state(self)
    }

    fn toggle(&self) -> BoxFuture<'_, RecordingState> {
        Box::pin(SessionTracker::toggle(self))
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        release(lifecycle.capture.take(), lifecycle.tasks.take());
    }
}

fn release(capture: Option<Box<dyn StopHandle>>, tasks: Option<TaskGuard>) {
    drop(tasks);
    if let Some(capture) = capture {
        contain("stop capture", || {
            capture.stop();
            Ok(())
        });
    }
}

async fn flush_loop(engine: Arc<DeliveryEngine>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                engine.flush().await;
            }
        }
    }
    debug!("Flush task stopped");
}

async fn unload_hook(engine: Arc<DeliveryEngine>, unload: UnloadSignal, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = unload.notified() => {
                debug!("Unload signal received, flushing");
                engine.flush().await;
            }
        }
    }
}
