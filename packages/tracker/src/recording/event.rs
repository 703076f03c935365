// packages/tracker/src/recording/event.rs
//! Opaque captured event record

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single captured event.
///
/// The tracker never inspects the payload; it is forwarded to the collection
/// endpoint as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Value);

impl Event {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Event {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
