//! Process-wide table of in-flight completion streams.
//!
//! Cancellation is coarse: [`CancellationRegistry::abort_all`] stops every
//! registered stream. There is no per-session cancel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Opaque identifier of one stream session, unique per registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(uuid::Uuid);

impl SessionKey {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Cloneable handle to the shared registry; clones see the same table.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    sessions: Arc<Mutex<HashMap<SessionKey, CancellationToken>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a cancellation token for `key`.
    pub fn register(&self, key: SessionKey) -> CancellationToken {
        let token = CancellationToken::new();
        self.sessions.lock().insert(key, token.clone());
        token
    }

    /// Remove `key` if present. Safe to call more than once.
    pub fn deregister(&self, key: &SessionKey) {
        self.sessions.lock().remove(key);
    }

    /// Cancel every registered session and clear the table.
    ///
    /// Returns the number of sessions signalled. The streams themselves wind
    /// down asynchronously; they forward no further fragments.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<CancellationToken> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, token)| token).collect()
        };
        for token in &drained {
            token.cancel();
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Aborted active streams");
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().contains_key(key)
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("active", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        assert_ne!(SessionKey::new(), SessionKey::new());
    }

    #[test]
    fn test_abort_all_cancels_and_clears() {
        let registry = CancellationRegistry::new();
        let a = registry.register(SessionKey::new());
        let b = registry.register(SessionKey::new());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.abort_all(), 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(registry.is_empty());
        assert_eq!(registry.abort_all(), 0);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = CancellationRegistry::new();
        let key = SessionKey::new();
        let token = registry.register(key.clone());
        assert!(registry.contains(&key));

        registry.deregister(&key);
        registry.deregister(&key);
        assert!(registry.is_empty());

        // a deregistered session is not reached by abort_all
        registry.abort_all();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clones_share_table() {
        let registry = CancellationRegistry::new();
        let other = registry.clone();
        let token = other.register(SessionKey::new());
        registry.abort_all();
        assert!(token.is_cancelled());
        assert!(other.is_empty());
    }
}
