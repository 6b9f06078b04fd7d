//! Ephemeral authenticated sessions.
//!
//! A session is created once at login and checked on every protected call.
//! Records are write-once: `{subject, created_at}` behind an opaque token,
//! destroyed on explicit logout or when the 24-hour TTL elapses, whichever
//! comes first.
//!
//! Two interchangeable backends sit behind [`SessionStore`]:
//!
//! - [`RedisSessionStore`] - shared key-value store with native expiry.
//!   Required for any multi-instance deployment.
//! - [`MemorySessionStore`] - process-local map with lazy TTL eviction.
//!   A single-process development fallback only; it does not survive
//!   restart and is not shared across instances.
//!
//! Backend selection happens once at process start via [`select_backend`]
//! and is immutable for the process lifetime.

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Absolute session lifetime: 24 hours from creation, regardless of activity.
pub const SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Stored session payload. Fields are write-once; the record is never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Identity the session was issued for (e.g. an email address).
    pub subject: String,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
}

impl SessionRecord {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether the record's absolute TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let age = chrono::Utc::now().timestamp() - self.created_at;
        age >= ttl.as_secs() as i64
    }
}

/// Derives an opaque session token from the subject, the wall clock, and a
/// random salt, hashed. Uniqueness is probabilistic; a collision is
/// cryptographically negligible and not explicitly checked.
#[must_use]
pub fn issue_token(subject: &str) -> String {
    let salt: [u8; 16] = rand::random();

    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(chrono::Utc::now().timestamp_micros().to_le_bytes());
    hasher.update(salt);

    let digest = hasher.finalize();
    let mut token = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(token, "{byte:02x}");
    }
    token
}

/// Uniform create/verify/delete over opaque session tokens.
pub trait SessionStore: Send + Sync {
    /// Backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Issues a token for `subject` and stores the record with the TTL.
    ///
    /// Fails loudly: a login whose session cannot be persisted must not
    /// appear to succeed.
    fn create(&self, subject: &str) -> anyhow::Result<String>;

    /// Returns the subject if the token exists and is unexpired.
    ///
    /// Expired or malformed entries are treated as invalid (never an error)
    /// and evicted as a side effect where the backend requires it.
    fn verify(&self, token: &str) -> Option<String>;

    /// Removes the session. Idempotent; unknown tokens are not an error.
    fn delete(&self, token: &str);
}

/// Selects the session backend once at startup.
///
/// Prefers redis when a URL is supplied and reachable; otherwise falls back
/// to the in-process store. The fallback is explicitly non-production: it is
/// never silently promoted, and the warning below is the operator's signal.
#[must_use]
pub fn select_backend(redis_url: Option<&str>) -> Arc<dyn SessionStore> {
    if let Some(url) = redis_url {
        match RedisSessionStore::connect(url, SESSION_TTL) {
            Ok(store) => {
                tracing::info!("redis session backend ready");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("redis unavailable: {e:#}");
            }
        }
    }
    tracing::warn!(
        "using in-memory session store: single-process development fallback, NOT for production"
    );
    Arc::new(MemorySessionStore::new(SESSION_TTL))
}

/// [`select_backend`] driven by the `PATIENTSIM_REDIS_URL` environment variable.
#[must_use]
pub fn select_backend_from_env() -> Arc<dyn SessionStore> {
    let url = std::env::var("PATIENTSIM_REDIS_URL").ok();
    select_backend(url.as_deref())
}

#[cfg(test)]
mod tests {
    use super::{SessionRecord, issue_token};
    use std::time::Duration;

    #[test]
    fn tokens_are_unique_per_call() {
        let a = issue_token("a@b.com");
        let b = issue_token("a@b.com");
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_are_hex_sha256() {
        let token = issue_token("a@b.com");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fresh_record_is_not_expired() {
        let record = SessionRecord::new("a@b.com");
        assert!(!record.is_expired(Duration::from_secs(86_400)));
    }

    #[test]
    fn old_record_is_expired() {
        let record = SessionRecord {
            subject: "a@b.com".to_string(),
            created_at: chrono::Utc::now().timestamp() - 90_000,
        };
        assert!(record.is_expired(Duration::from_secs(86_400)));
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = SessionRecord::new("a@b.com");
        let payload = serde_json::to_string(&record).unwrap();
        let parsed: SessionRecord = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, record);
    }
}
