//! In-process session store.
//!
//! Development fallback for single-instance deployments without redis.
//! State lives for the process lifetime only. TTL is enforced lazily: an
//! expired entry is evicted when a verify touches it, with no background
//! sweep.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::{SessionRecord, SessionStore, issue_token};

struct Entry {
    record: SessionRecord,
    created: Instant,
}

/// Process-local token map with lazy TTL eviction.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map only means another request panicked mid-insert;
        // the data itself stays usable.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn create(&self, subject: &str) -> anyhow::Result<String> {
        let token = issue_token(subject);
        self.lock().insert(
            token.clone(),
            Entry {
                record: SessionRecord::new(subject),
                created: Instant::now(),
            },
        );
        Ok(token)
    }

    fn verify(&self, token: &str) -> Option<String> {
        let mut sessions = self.lock();
        let entry = sessions.get(token)?;
        if entry.created.elapsed() >= self.ttl {
            // Lazy eviction on read.
            sessions.remove(token);
            return None;
        }
        Some(entry.record.subject.clone())
    }

    fn delete(&self, token: &str) {
        self.lock().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySessionStore;
    use crate::SessionStore;
    use std::time::Duration;

    #[test]
    fn create_then_verify_round_trips() {
        let store = MemorySessionStore::new(Duration::from_secs(86_400));
        let token = store.create("a@b.com").unwrap();
        assert_eq!(store.verify(&token), Some("a@b.com".to_string()));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let store = MemorySessionStore::new(Duration::from_secs(86_400));
        assert_eq!(store.verify("deadbeef"), None);
    }

    #[test]
    fn expired_session_is_invalid_and_evicted() {
        let store = MemorySessionStore::new(Duration::from_millis(20));
        let token = store.create("a@b.com").unwrap();

        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.verify(&token), None);
        // The expired entry was removed on read, not just hidden.
        assert!(store.lock().is_empty());
    }

    #[test]
    fn delete_invalidates_before_ttl() {
        let store = MemorySessionStore::new(Duration::from_secs(86_400));
        let token = store.create("a@b.com").unwrap();

        store.delete(&token);
        assert_eq!(store.verify(&token), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemorySessionStore::new(Duration::from_secs(86_400));
        store.delete("no-such-token");
        store.delete("no-such-token");
    }

    #[test]
    fn sessions_are_independent_per_subject() {
        let store = MemorySessionStore::new(Duration::from_secs(86_400));
        let a = store.create("a@b.com").unwrap();
        let b = store.create("c@d.com").unwrap();

        store.delete(&a);
        assert_eq!(store.verify(&b), Some("c@d.com".to_string()));
    }
}
