// packages/tracker/src/recording/state.rs
//! Recording state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether captured events are currently being generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Active,
    Inactive,
}

impl RecordingState {
    pub fn is_active(self) -> bool {
        matches!(self, RecordingState::Active)
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Inactive
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Active => write!(f, "active"),
            RecordingState::Inactive => write!(f, "inactive"),
        }
    }
}
