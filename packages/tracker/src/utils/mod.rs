// packages/tracker/src/utils/mod.rs
//! Common utilities: configuration, errors, and clock helpers

pub mod config;
pub mod errors;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
