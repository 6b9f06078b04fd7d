//! Token budget accounting for a conversation window.

use thiserror::Error;

/// Raised when the caller's system prompt leaves too little room for any
/// real conversation context. Fatal to the request; not retryable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("system prompt too large for the configured context budget")]
    SystemPromptTooLarge,
}

/// Fixed token budget for one model call.
///
/// The serialized cost of system prompt + kept messages + the reserved reply
/// allowance must never exceed `total`. The character-per-token ratio used
/// for boundary truncation is an empirical constant, not derived from the
/// active tokenizer; re-measure it if the tokenizer changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextBudget {
    /// Maximum tokens the provider accepts per call, prompt and reply included.
    pub total: u32,
    /// Tokens reserved for the model's reply.
    pub reply_reserve: u32,
    /// Slack for counting inaccuracies and message framing overhead.
    pub safety_margin: u32,
    /// Below this much remaining room, the system prompt is considered too
    /// large to leave space for any real context.
    pub min_available: u32,
    /// Empirical characters-per-token ratio used to size boundary truncation.
    pub chars_per_token: f64,
    /// Truncation shorter than this many characters is not worth keeping.
    pub min_truncate_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            total: 10_000,
            reply_reserve: 500,
            safety_margin: 100,
            min_available: 500,
            chars_per_token: 3.5,
            min_truncate_chars: 50,
        }
    }
}

impl ContextBudget {
    /// Tokens available for conversation history once the system prompt and
    /// reply reserve are accounted for.
    pub fn available(&self, system_prompt_tokens: u32) -> Result<u32, BudgetError> {
        let available = self
            .total
            .saturating_sub(self.reply_reserve)
            .saturating_sub(system_prompt_tokens)
            .saturating_sub(self.safety_margin);

        if available < self.min_available {
            return Err(BudgetError::SystemPromptTooLarge);
        }
        Ok(available)
    }
}
