// packages/tracker/src/widget.rs
//! Recording toggle surface
//!
//! The tracker exposes its recording state and a single toggle through
//! [`ToggleSurface`]. When a widget is enabled, every state change is pushed
//! to a [`WidgetView`] as a [`WidgetAppearance`]; drawing it is up to the
//! view.

use crate::recording::state::RecordingState;
use futures::future::BoxFuture;
use tracing::info;

/// Minimal control surface a visible toggle needs
pub trait ToggleSurface: Send + Sync {
    fn recording_state(&self) -> RecordingState;

    fn is_recording(&self) -> bool {
        self.recording_state().is_active()
    }

    /// Pause when active, resume otherwise; resolves to the new state
    fn toggle(&self) -> BoxFuture<'_, RecordingState>;
}

/// What the widget should currently look like
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetAppearance {
    pub recording: bool,

    /// Opacity of the animated parts, 0.0 to 1.0
    pub intensity: f32,

    /// Hover text
    pub title: &'static str,
}

impl WidgetAppearance {
    pub fn for_state(state: RecordingState) -> Self {
        if state.is_active() {
            Self {
                recording: true,
                intensity: 1.0,
                title: "Recording session - Click to stop",
            }
        } else {
            Self {
                recording: false,
                intensity: 0.3,
                title: "Not recording - Click to start",
            }
        }
    }
}

/// Renders the widget
pub trait WidgetView: Send + Sync {
    fn render(&self, appearance: &WidgetAppearance);

    /// Called once when the widget is removed
    fn remove(&self) {}
}

/// View that reports state changes through `tracing`
#[derive(Debug, Default)]
pub struct LogView;

impl WidgetView for LogView {
    fn render(&self, appearance: &WidgetAppearance) {
        info!(recording = appearance.recording, "{}", appearance.title);
    }
}

/// A visible toggle bound to a view
pub struct Widget {
    view: Box<dyn WidgetView>,
}

impl Widget {
    /// Create the widget and draw its initial state
    pub fn new(view: Box<dyn WidgetView>, state: RecordingState) -> Self {
        let widget = Self { view };
        widget.update(state);
        widget
    }

    pub fn update(&self, state: RecordingState) {
        self.view.render(&WidgetAppearance::for_state(state));
    }

    pub fn remove(self) {
        self.view.remove();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// View recording every appearance it is asked to draw
    #[derive(Clone, Default)]
    pub(crate) struct RecordingView {
        pub(crate) rendered: Arc<Mutex<Vec<WidgetAppearance>>>,
        pub(crate) removed: Arc<Mutex<bool>>,
    }

    impl WidgetView for RecordingView {
        fn render(&self, appearance: &WidgetAppearance) {
            self.rendered.lock().push(*appearance);
        }

        fn remove(&self) {
            *self.removed.lock() = true;
        }
    }

    #[test]
    fn test_appearance_by_state() {
        let active = WidgetAppearance::for_state(RecordingState::Active);
        assert!(active.recording);
        assert_eq!(active.intensity, 1.0);
        assert_eq!(active.title, "Recording session - Click to stop");

        let inactive = WidgetAppearance::for_state(RecordingState::Inactive);
        assert!(!inactive.recording);
        assert_eq!(inactive.intensity, 0.3);
        assert_eq!(inactive.title, "Not recording - Click to start");
    }

    #[test]
    fn test_widget_renders_initial_state_and_updates() {
        let view = RecordingView::default();
        let widget = Widget::new(Box::new(view.clone()), RecordingState::Inactive);
        widget.update(RecordingState::Active);

        let rendered = view.rendered.lock().clone();
        assert_eq!(rendered.len(), 2);
        assert!(!rendered[0].recording);
        assert!(rendered[1].recording);

        widget.remove();
        assert!(*view.removed.lock());
    }
}
