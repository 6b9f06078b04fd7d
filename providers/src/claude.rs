//! Anthropic Messages API client (non-streaming).

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;

use patientsim_types::Message;

use crate::{
    CLAUDE_MESSAGES_API_URL, InvokeError, ModelInvoker, http_client, read_capped_error_body,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Sampling parameters tuned for in-character patient replies.
const TEMPERATURE: f64 = 0.8;
const TOP_P: f64 = 0.9;

/// Maximum concurrent in-flight model calls. Requests beyond this wait for a
/// permit; the request-handling layer itself is never blocked.
const MAX_IN_FLIGHT_CALLS: usize = 10;

/// Provider credentials and model selection.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
}

impl ModelConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_url: CLAUDE_MESSAGES_API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Reads configuration from the environment.
    ///
    /// Returns `None` when `ANTHROPIC_API_KEY` is unset; the service then
    /// starts without a client and every call fails fast with
    /// [`InvokeError::NotReady`].
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        let model = std::env::var("PATIENTSIM_MODEL")
            .unwrap_or_else(|_| "claude-haiku-4-5".to_string());
        let api_url = std::env::var("PATIENTSIM_API_URL")
            .unwrap_or_else(|_| CLAUDE_MESSAGES_API_URL.to_string());
        Some(Self {
            api_key,
            model,
            api_url,
        })
    }
}

/// Non-streaming Messages API client with a bounded in-flight permit pool.
pub struct ClaudeClient {
    config: ModelConfig,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for ClaudeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeClient")
            .field("model", &self.config.model)
            .field("api_url", &self.config.api_url)
            .finish_non_exhaustive()
    }
}

impl ClaudeClient {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        tracing::info!(model = %config.model, "model client ready");
        Self {
            config,
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT_CALLS)),
        }
    }

    /// Builds a client from the environment, or `None` when unconfigured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        ModelConfig::from_env().map(Self::new)
    }

    async fn call(
        &self,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, InvokeError> {
        // Bound in-flight calls. acquire() only fails if the semaphore is
        // closed, which never happens here.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| InvokeError::CallFailed(e.to_string()))?;

        let body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "system": system_prompt,
            "messages": messages,
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
        });

        let response = http_client()
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvokeError::CallFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(model = %self.config.model, "provider rate limit hit");
            return Err(InvokeError::RateLimited);
        }
        if !status.is_success() {
            let detail = read_capped_error_body(response).await;
            tracing::warn!(%status, "provider call failed");
            return Err(InvokeError::CallFailed(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InvokeError::CallFailed(format!("invalid response body: {e}")))?;

        extract_reply_text(&payload)
            .ok_or_else(|| InvokeError::CallFailed("no text content block in response".to_string()))
    }
}

impl ModelInvoker for ClaudeClient {
    fn invoke(
        &self,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send {
        self.call(system_prompt, messages, max_tokens)
    }
}

/// Text of the first `type == "text"` content block, if any.
fn extract_reply_text(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(serde_json::Value::as_str) == Some("text"))
        .and_then(|block| block.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
