//! Redis-backed session store.
//!
//! Preferred backend: shared across instances, survives process restart,
//! and expiry is native (`SETEX`). `verify` additionally re-checks the
//! record's `created_at` age so a TTL misconfiguration on the key can never
//! extend a session past its absolute lifetime.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::Commands;

use crate::{SessionRecord, SessionStore, issue_token};

/// Shared key-value session store with native expiry.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl: Duration,
}

impl RedisSessionStore {
    /// Opens the client and pings the server so an unreachable redis is
    /// caught at startup rather than on the first login.
    pub fn connect(url: &str, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("invalid redis url for session store: {url}"))?;
        let mut connection = client
            .get_connection()
            .context("failed to open redis connection for session store")?;
        redis::cmd("PING")
            .query::<String>(&mut connection)
            .context("redis ping failed")?;
        Ok(Self { client, ttl })
    }

    fn connection(&self) -> Result<redis::Connection> {
        self.client
            .get_connection()
            .context("failed to open redis connection")
    }
}

impl SessionStore for RedisSessionStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn create(&self, subject: &str) -> Result<String> {
        let token = issue_token(subject);
        let record = SessionRecord::new(subject);
        let payload =
            serde_json::to_string(&record).context("failed to encode session record")?;

        let mut connection = self.connection()?;
        connection
            .set_ex::<_, _, ()>(&token, payload, self.ttl.as_secs())
            .context("failed to write session record to redis")?;
        Ok(token)
    }

    fn verify(&self, token: &str) -> Option<String> {
        let mut connection = match self.connection() {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("session verify degraded to invalid: {e:#}");
                return None;
            }
        };

        let payload: Option<String> = match connection.get(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("session read failed, treating as invalid: {e}");
                return None;
            }
        };
        let payload = payload?;

        // Malformed payloads are invalid, not an error.
        let record: SessionRecord = serde_json::from_str(&payload).ok()?;

        if record.is_expired(self.ttl) {
            if let Err(e) = connection.del::<_, ()>(token) {
                tracing::warn!("failed to evict expired session: {e}");
            }
            return None;
        }
        Some(record.subject)
    }

    fn delete(&self, token: &str) {
        match self.connection() {
            Ok(mut connection) => {
                if let Err(e) = connection.del::<_, ()>(token) {
                    tracing::warn!("session delete failed: {e}");
                }
            }
            Err(e) => tracing::warn!("session delete skipped: {e:#}"),
        }
    }
}
