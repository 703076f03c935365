// packages/tracker/src/session/identity.rs
//! Session identity manager
//!
//! Resolves the session id once per tracker instance: a persisted session is
//! resumed while its last activity lies inside the timeout window, otherwise
//! a new id is minted and persisted. Every resume rewrites the last-activity
//! timestamp, so page loads renew the window just like captured events do.

use crate::session::store::{SessionStore, LAST_ACTIVITY_KEY, SESSION_ID_KEY, STARTED_AT_KEY};
use crate::utils::errors::Result;
use crate::utils::now_millis;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const ID_SUFFIX_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Minimum gap between two persisted activity writes
pub const ACTIVITY_WRITE_INTERVAL_MS: i64 = 1_000;

/// Snapshot of the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session id
    pub id: String,

    /// Creation time (ms since epoch)
    pub started_at: i64,

    /// Most recent observed activity (ms since epoch)
    pub last_activity: i64,
}

/// Generate `<unix-millis>-<9 base36 chars>`
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", now_millis(), suffix)
}

/// Owns the session id for one tracker instance
pub struct SessionIdentity {
    id: String,
    started_at: i64,
    last_activity: AtomicI64,

    /// Last activity value written to the store
    persisted_activity: AtomicI64,

    /// `None` when running on an ephemeral id
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionIdentity {
    /// Resume or mint a session against the current clock
    pub fn resolve(
        store: Option<Arc<dyn SessionStore>>,
        timeout: Duration,
        preferred_id: Option<&str>,
    ) -> Self {
        Self::resolve_at(store, timeout, preferred_id, now_millis())
    }

    /// Resume or mint a session as of `now` (ms since epoch)
    pub fn resolve_at(
        store: Option<Arc<dyn SessionStore>>,
        timeout: Duration,
        preferred_id: Option<&str>,
        now: i64,
    ) -> Self {
        let Some(store) = store else {
            debug!("No session store configured, using ephemeral session");
            return Self::from_session(new_session(preferred_id, now), None);
        };

        let session = match restore(store.as_ref(), timeout, now) {
            Ok(Some(session)) => return Self::from_session(session, Some(store)),
            Ok(None) => new_session(preferred_id, now),
            Err(e) => {
                warn!("Session store unavailable, using ephemeral session: {}", e);
                return Self::from_session(new_session(preferred_id, now), None);
            }
        };

        match persist(store.as_ref(), &session) {
            Ok(()) => {
                info!(session_id = %session.id, "New session created");
                Self::from_session(session, Some(store))
            }
            Err(e) => {
                // the store may already hold this id
                warn!(
                    session_id = %session.id,
                    "Failed to persist session, continuing ephemeral: {}", e
                );
                Self::from_session(session, None)
            }
        }
    }

    fn from_session(session: Session, store: Option<Arc<dyn SessionStore>>) -> Self {
        Self {
            id: session.id,
            started_at: session.started_at,
            last_activity: AtomicI64::new(session.last_activity),
            persisted_activity: AtomicI64::new(session.last_activity),
            store,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> Session {
        Session {
            id: self.id.clone(),
            started_at: self.started_at,
            last_activity: self.last_activity.load(Ordering::Relaxed),
        }
    }

    /// True when the id lives only in this instance
    pub fn is_ephemeral(&self) -> bool {
        self.store.is_none()
    }

    /// Record activity now
    pub fn touch(&self) {
        self.touch_at(now_millis());
    }

    /// Record activity at `now`.
    ///
    /// The in-memory timestamp always advances; the store is written at most
    /// once per [`ACTIVITY_WRITE_INTERVAL_MS`]. Persistence failures are ignored.
    pub fn touch_at(&self, now: i64) {
        self.last_activity.fetch_max(now, Ordering::Relaxed);

        let Some(store) = &self.store else {
            return;
        };

        let persisted = self.persisted_activity.load(Ordering::Relaxed);
        if now.saturating_sub(persisted) < ACTIVITY_WRITE_INTERVAL_MS {
            return;
        }
        // one writer per interval
        if self
            .persisted_activity
            .compare_exchange(persisted, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        if let Err(e) = store.set(LAST_ACTIVITY_KEY, &now.to_string()) {
            debug!("Failed to persist session activity: {}", e);
        }
    }

    /// Remove the persisted session record
    pub fn clear(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let result = [SESSION_ID_KEY, LAST_ACTIVITY_KEY, STARTED_AT_KEY]
            .into_iter()
            .try_for_each(|key| store.remove(key));

        match result {
            Ok(()) => info!(session_id = %self.id, "Session cleared"),
            Err(e) => debug!("Failed to clear persisted session: {}", e),
        }
    }
}

fn new_session(preferred_id: Option<&str>, now: i64) -> Session {
    let id = preferred_id
        .map(str::to_string)
        .unwrap_or_else(generate_session_id);
    Session {
        id,
        started_at: now,
        last_activity: now,
    }
}

/// The persisted session, if one exists and is still inside the window
fn restore(store: &dyn SessionStore, timeout: Duration, now: i64) -> Result<Option<Session>> {
    let stored_id = store.get(SESSION_ID_KEY)?;
    let stored_activity = store.get(LAST_ACTIVITY_KEY)?;

    if let (Some(id), Some(activity)) = (stored_id, stored_activity) {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);

        match activity.trim().parse::<i64>() {
            Ok(last_activity) if now.saturating_sub(last_activity) < timeout_ms => {
                store.set(LAST_ACTIVITY_KEY, &now.to_string())?;

                let started_at = store
                    .get(STARTED_AT_KEY)?
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .unwrap_or(last_activity);

                info!(session_id = %id, "Resuming session");
                return Ok(Some(Session {
                    id,
                    started_at,
                    last_activity: now,
                }));
            }
            Ok(_) => info!(session_id = %id, "Session expired, creating new session"),
            Err(_) => warn!("Stored session activity is unreadable, creating new session"),
        }
    }

    Ok(None)
}

fn persist(store: &dyn SessionStore, session: &Session) -> Result<()> {
    store.set(SESSION_ID_KEY, &session.id)?;
    store.set(LAST_ACTIVITY_KEY, &session.last_activity.to_string())?;
    store.set(STARTED_AT_KEY, &session.started_at.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;
    use crate::utils::errors::TrackerError;
    use std::sync::atomic::AtomicUsize;

    const TIMEOUT: Duration = Duration::from_secs(30 * 60);
    const MINUTE: i64 = 60 * 1000;

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(TrackerError::StoreUnavailable("quota exceeded".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(TrackerError::StoreUnavailable("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(TrackerError::StoreUnavailable("quota exceeded".to_string()))
        }
    }

    /// Counts writes; optionally refuses to write one key
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        sets: AtomicUsize,
        reject: Option<&'static str>,
    }

    impl SessionStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.reject == Some(key) {
                return Err(TrackerError::StoreUnavailable("disk full".to_string()));
            }
            self.sets.fetch_add(1, Ordering::Relaxed);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn memory() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_generated_id_format() {
        let id = generate_session_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn test_resume_within_timeout() {
        let store = memory();
        let now = 1_700_000_000_000;

        let first = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now);
        let second =
            SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now + 10 * MINUTE);

        assert_eq!(first.session_id(), second.session_id());
        assert_eq!(second.session().started_at, now);
        assert_eq!(
            store.get(LAST_ACTIVITY_KEY).unwrap(),
            Some((now + 10 * MINUTE).to_string())
        );
    }

    #[test]
    fn test_sliding_window_renews_on_resolve() {
        let store = memory();
        let now = 1_700_000_000_000;

        let first = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now);
        // each load lands inside the window of the previous one
        SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now + 20 * MINUTE);
        let third =
            SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now + 40 * MINUTE);

        assert_eq!(first.session_id(), third.session_id());
    }

    #[test]
    fn test_rotate_after_timeout_overwrites_record() {
        let store = memory();
        let now = 1_700_000_000_000;
        store.set(SESSION_ID_KEY, "old-session").unwrap();
        store
            .set(LAST_ACTIVITY_KEY, &(now - 40 * MINUTE).to_string())
            .unwrap();

        let identity = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now);

        assert_ne!(identity.session_id(), "old-session");
        assert_eq!(
            store.get(SESSION_ID_KEY).unwrap().as_deref(),
            Some(identity.session_id())
        );
        assert_eq!(store.get(LAST_ACTIVITY_KEY).unwrap(), Some(now.to_string()));
        assert_eq!(store.get(STARTED_AT_KEY).unwrap(), Some(now.to_string()));
    }

    #[test]
    fn test_exact_timeout_boundary_rotates() {
        let store = memory();
        let now = 1_700_000_000_000;
        store.set(SESSION_ID_KEY, "old-session").unwrap();
        store
            .set(LAST_ACTIVITY_KEY, &(now - 30 * MINUTE).to_string())
            .unwrap();

        let identity = SessionIdentity::resolve_at(Some(store), TIMEOUT, None, now);
        assert_ne!(identity.session_id(), "old-session");
    }

    #[test]
    fn test_preferred_id_used_when_minting() {
        let store = memory();
        let identity = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, Some("custom"), 1);
        assert_eq!(identity.session_id(), "custom");
        assert!(!identity.is_ephemeral());
        assert_eq!(store.get(SESSION_ID_KEY).unwrap().as_deref(), Some("custom"));
    }

    #[test]
    fn test_stored_session_wins_over_preferred_id() {
        let store = memory();
        store.set(SESSION_ID_KEY, "stored").unwrap();
        store.set(LAST_ACTIVITY_KEY, "1000").unwrap();

        let identity = SessionIdentity::resolve_at(Some(store), TIMEOUT, Some("custom"), 2000);
        assert_eq!(identity.session_id(), "stored");
    }

    #[test]
    fn test_unreadable_timestamp_rotates() {
        let store = memory();
        store.set(SESSION_ID_KEY, "stored").unwrap();
        store.set(LAST_ACTIVITY_KEY, "not-a-number").unwrap();

        let identity = SessionIdentity::resolve_at(Some(store), TIMEOUT, None, 2000);
        assert_ne!(identity.session_id(), "stored");
    }

    #[test]
    fn test_broken_store_falls_back_to_ephemeral() {
        let identity =
            SessionIdentity::resolve_at(Some(Arc::new(BrokenStore)), TIMEOUT, Some("eph"), 5);
        assert_eq!(identity.session_id(), "eph");
        assert!(identity.is_ephemeral());

        // no store left to fail
        identity.touch_at(10);
        identity.clear();
        assert_eq!(identity.session().last_activity, 10);
    }

    #[test]
    fn test_missing_store_is_ephemeral() {
        let identity = SessionIdentity::resolve_at(None, TIMEOUT, None, 5);
        assert!(identity.is_ephemeral());
        assert!(!identity.session_id().is_empty());
    }

    #[test]
    fn test_touch_persists_activity() {
        let store = memory();
        let identity = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, 1_000);

        identity.touch_at(5_000);
        assert_eq!(store.get(LAST_ACTIVITY_KEY).unwrap().as_deref(), Some("5000"));
        assert_eq!(identity.session().last_activity, 5_000);
    }

    #[test]
    fn test_activity_writes_are_throttled() {
        let store = Arc::new(CountingStore::default());
        let now = 1_700_000_000_000;
        let identity = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now);
        let after_resolve = store.sets.load(Ordering::Relaxed);

        // a burst of 500 events over half a second
        for n in 0..500 {
            identity.touch_at(now + n);
        }
        assert_eq!(store.sets.load(Ordering::Relaxed), after_resolve);
        assert_eq!(identity.session().last_activity, now + 499);

        identity.touch_at(now + ACTIVITY_WRITE_INTERVAL_MS);
        for n in 1..500 {
            identity.touch_at(now + ACTIVITY_WRITE_INTERVAL_MS + n);
        }
        assert_eq!(store.sets.load(Ordering::Relaxed), after_resolve + 1);
        assert_eq!(
            store.get(LAST_ACTIVITY_KEY).unwrap(),
            Some((now + ACTIVITY_WRITE_INTERVAL_MS).to_string())
        );
    }

    #[test]
    fn test_partial_persist_keeps_minted_id() {
        let store = Arc::new(CountingStore {
            reject: Some(STARTED_AT_KEY),
            ..Default::default()
        });

        let identity = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, 1_000);

        assert!(identity.is_ephemeral());
        assert_eq!(
            store.get(SESSION_ID_KEY).unwrap().as_deref(),
            Some(identity.session_id())
        );
    }

    #[test]
    fn test_clear_forces_new_session() {
        let store = memory();
        let now = 1_700_000_000_000;
        let first = SessionIdentity::resolve_at(Some(store.clone()), TIMEOUT, None, now);

        first.clear();
        assert!(store.is_empty());

        let second = SessionIdentity::resolve_at(Some(store), TIMEOUT, None, now + MINUTE);
        assert_ne!(first.session_id(), second.session_id());
    }
}
