// packages/tracker/src/delivery/payload.rs
//! Request body sent to the collection endpoint

use crate::recording::event::Event;
use crate::utils::config::TrackerConfig;
use crate::BuildInfo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /sessions/{id}/events`
#[derive(Debug, Serialize)]
pub struct EventBatch<'a> {
    pub events: &'a [Event],

    /// Send time (ms since epoch)
    pub timestamp: i64,

    pub metadata: &'a Map<String, Value>,
}

/// Owned form of [`EventBatch`], as decoded by a collector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceivedBatch {
    pub events: Vec<Event>,
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Session metadata attached to every request.
///
/// Identity fields come first and may be overridden by caller metadata;
/// `userAgent` and `timestamp` always reflect the tracker itself.
pub fn session_metadata(config: &TrackerConfig, created_at: i64) -> Map<String, Value> {
    let mut metadata = Map::new();

    let identity = [
        ("userId", &config.user_id),
        ("userEmail", &config.user_email),
        ("userName", &config.user_name),
        ("appName", &config.app_name),
    ];
    for (key, value) in identity {
        if let Some(value) = value {
            metadata.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    metadata.insert("optInMode".to_string(), Value::Bool(config.opt_in));

    metadata.extend(config.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

    metadata.insert("userAgent".to_string(), Value::String(user_agent()));
    metadata.insert("timestamp".to_string(), Value::from(created_at));

    metadata
}

fn user_agent() -> String {
    let info = BuildInfo::current();
    format!(
        "{}/{} ({}; {}; {})",
        env!("CARGO_PKG_NAME"),
        info.version,
        std::env::consts::OS,
        std::env::consts::ARCH,
        info.git_hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_omits_absent_fields() {
        let config = TrackerConfig::new("http://localhost:3001");
        let metadata = session_metadata(&config, 42);

        assert!(!metadata.contains_key("userId"));
        assert_eq!(metadata["optInMode"], false);
        assert_eq!(metadata["timestamp"], 42);
        assert!(metadata["userAgent"]
            .as_str()
            .unwrap()
            .starts_with("session-tracker/"));
    }

    #[test]
    fn test_caller_metadata_cannot_override_agent() {
        let mut config = TrackerConfig::new("http://localhost:3001");
        config.user_id = Some("u-1".to_string());
        config.opt_in = true;
        config.metadata.insert("userId".to_string(), json!("override"));
        config.metadata.insert("userAgent".to_string(), json!("spoofed"));
        config.metadata.insert("plan".to_string(), json!("pro"));

        let metadata = session_metadata(&config, 7);
        assert_eq!(metadata["userId"], "override");
        assert_eq!(metadata["plan"], "pro");
        assert_eq!(metadata["optInMode"], true);
        assert_ne!(metadata["userAgent"], "spoofed");
    }

    #[test]
    fn test_batch_shape() {
        let events = vec![Event::new(json!({"type": 1})), Event::new(json!({"type": 2}))];
        let metadata = Map::new();
        let batch = EventBatch {
            events: &events,
            timestamp: 99,
            metadata: &metadata,
        };

        let encoded = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            encoded,
            json!({"events": [{"type": 1}, {"type": 2}], "timestamp": 99, "metadata": {}})
        );

        let decoded: ReceivedBatch = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.events, events);
    }
}
