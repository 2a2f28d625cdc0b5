//! Shared session registry: one writer (the collector), many readers.

use std::collections::HashMap;

use gridgate_protocol::Session;
use parking_lot::RwLock;

/// In-memory registry of live sessions keyed by `browser_id`.
///
/// The store never creates or destroys entries on its own; the collector
/// owns all mutation. Methods are synchronous and never hold the lock
/// across I/O.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `browser_id`. Always succeeds.
    pub fn set(&self, browser_id: impl Into<String>, session: Session) {
        self.inner.write().insert(browser_id.into(), session);
    }

    /// Remove the session for `browser_id`. A no-op if absent.
    pub fn delete(&self, browser_id: &str) {
        self.inner.write().remove(browser_id);
    }

    /// Current session for `browser_id`, if any.
    pub fn get(&self, browser_id: &str) -> Option<Session> {
        self.inner.read().get(browser_id).cloned()
    }

    /// Snapshot of all live sessions. Order is unspecified.
    pub fn list(&self) -> Vec<Session> {
        self.inner.read().values().cloned().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
