//! Token counting using tiktoken.
//!
//! This module provides **approximate** token counting using the `o200k_base`
//! encoding from tiktoken. Anthropic uses a proprietary tokenizer, so counts
//! may vary by a few percent; the safety margin in
//! [`ContextBudget`](crate::ContextBudget) absorbs the difference.
//!
//! If the encoder fails to load, counting falls back to a deterministic
//! `ceil(word_count * 1.3)` heuristic. The fallback never fails - it is the
//! last line of defense and always returns a number.

use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, o200k_base};

use patientsim_types::Message;

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so we create it once and reuse it across all `TokenCounter` instances.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

/// Empirical tokens-per-word ratio for English prose.
const TOKENS_PER_WORD: f64 = 1.3;

/// Heuristic token estimate: `ceil(word_count * 1.3)`.
///
/// Deterministic and infallible. Used whenever the tiktoken encoder is
/// unavailable.
fn heuristic_count(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).ceil() as u32
}

/// Thread-safe approximate token counter.
///
/// Uses tiktoken's `o200k_base` encoding when available and the word-count
/// heuristic otherwise. The strategy is selected once at first use and never
/// changes for the process lifetime.
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoder: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoder", &self.encoder.as_ref().map(|_| "<CoreBPE>"))
            .finish()
    }
}

impl TokenCounter {
    #[must_use]
    pub fn new() -> Self {
        let encoder = get_encoder();
        if encoder.is_none() {
            tracing::warn!(
                "Failed to initialize tiktoken o200k_base encoder. Falling back to word-count estimates."
            );
        }

        Self { encoder }
    }

    /// Counts the number of tokens in a string. Never fails.
    #[must_use]
    pub fn count_str(&self, text: &str) -> u32 {
        match self.encoder {
            Some(encoder) => {
                u32::try_from(encoder.encode_ordinary(text).len()).unwrap_or(u32::MAX)
            }
            None => heuristic_count(text),
        }
    }

    /// Counts tokens for a single message's content.
    #[must_use]
    pub fn count_message(&self, msg: &Message) -> u32 {
        self.count_str(&msg.content)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
