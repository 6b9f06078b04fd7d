//! Model invocation layer.
//!
//! [`ClaudeClient`] performs one inference call against the Anthropic
//! Messages API and classifies failures into [`InvokeError`]. Calls are
//! bounded by an in-flight permit pool so a burst of chat requests cannot
//! monopolize the scheduler or the provider connection pool.
//!
//! The [`ModelInvoker`] trait is the seam consumers program against; tests
//! substitute scripted implementations for it.

mod claude;

pub use claude::{ClaudeClient, ModelConfig};

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

use patientsim_types::Message;

/// Canonical Anthropic Messages API endpoint.
pub const CLAUDE_MESSAGES_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Establishing a connection should fail fast.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Generation can legitimately take a while; the read deadline is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Maximum bytes of an error body surfaced in [`InvokeError::CallFailed`].
const MAX_ERROR_BODY_BYTES: usize = 2 * 1024;

/// Classified failure of one model call.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The provider client was unavailable at startup. Fails fast without
    /// attempting the call; identical for every request until restart.
    #[error("model backend is not ready")]
    NotReady,
    /// Provider-side throttling. Retryable with backoff in bulk paths;
    /// surfaced immediately elsewhere so the caller can wait.
    #[error("rate limited by the model provider; wait a few seconds and retry")]
    RateLimited,
    /// Any other upstream or transport failure. Not retried automatically
    /// outside the bulk-analysis path.
    #[error("model call failed: {0}")]
    CallFailed(String),
}

/// One model call: `(system_prompt, messages, max_reply_tokens) -> reply text`.
pub trait ModelInvoker: Send + Sync {
    fn invoke(
        &self,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send;
}

/// Process-wide HTTP client with connect/read timeouts and no redirects.
///
/// Built once; reused across all calls for connection pooling.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build configured HTTP client: {e}. Using defaults.");
                reqwest::Client::new()
            })
    })
}

/// Read an error body for diagnostics, truncated so a hostile or enormous
/// response cannot balloon an error message.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(mut body) => {
            if body.len() > MAX_ERROR_BODY_BYTES {
                let mut end = MAX_ERROR_BODY_BYTES;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
                body.push_str("...(truncated)");
            }
            body
        }
        Err(e) => format!("<unreadable body: {e}>"),
    }
}
