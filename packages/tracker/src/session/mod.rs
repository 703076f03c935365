// packages/tracker/src/session/mod.rs
//! Session identity and persistence
//!
//! - **Store**: durable key-value access for the session record
//! - **Identity**: resume-or-rotate decision against the inactivity timeout
//!
//! # Lifecycle
//!
//! ```text
//! resolve() ──► stored (id, last_activity)?
//!                 │ yes, fresh        │ no / expired / unreadable
//!                 ▼                   ▼
//!            reuse id,           mint id, persist
//!            rewrite last_activity   (id, now)
//!
//! captured event ──► touch()  (last_activity = now)
//! stop()         ──► clear()  (record removed)
//! ```

pub mod identity;
pub mod store;

pub use identity::{generate_session_id, Session, SessionIdentity};
pub use store::{MemoryStore, SessionStore, SqliteStore};
