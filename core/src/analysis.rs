//! Bulk per-utterance analysis with rate-limit backoff.
//!
//! Each qualifying therapist utterance gets one independent model call.
//! Only rate-limit failures are retried, with doubling delay and bounded
//! attempts; any other failure degrades that single item to a fallback
//! record. One item's permanent failure never aborts its siblings - a bulk
//! request always returns one record per pair.

use std::time::Duration;

use patientsim_providers::{InvokeError, ModelInvoker};
use patientsim_types::{ImprovementRecord, Message, UtterancePair};

use crate::prompts::{ANALYSIS_SYSTEM_PROMPT, NEEDS_IMPROVEMENT_MARKER, improvement_prompt};

/// Reply allowance for one analysis call.
pub const MAX_ANALYSIS_TOKENS: u32 = 1_000;

/// Backoff and pacing knobs for bulk analysis.
///
/// Injectable so tests run with millisecond delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per utterance, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each rate-limited attempt.
    pub initial_delay: Duration,
    /// Fixed delay between independent utterances (not between retries),
    /// to reduce the chance of triggering rate limits at all.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            pacing: Duration::from_millis(500),
        }
    }
}

/// Analyzes every pair, isolating failures per item. Never fails as a whole.
pub async fn analyze_bulk<M: ModelInvoker>(
    model: &M,
    pairs: &[UtterancePair],
    policy: &RetryPolicy,
) -> Vec<ImprovementRecord> {
    let mut records = Vec::with_capacity(pairs.len());

    for (index, pair) in pairs.iter().enumerate() {
        records.push(analyze_one(model, pair, policy, index).await);

        if index + 1 < pairs.len() {
            tokio::time::sleep(policy.pacing).await;
        }
    }

    records
}

async fn analyze_one<M: ModelInvoker>(
    model: &M,
    pair: &UtterancePair,
    policy: &RetryPolicy,
    index: usize,
) -> ImprovementRecord {
    let prompt = improvement_prompt(&pair.therapist, &pair.patient, &pair.context);
    let messages = [Message::user(prompt)];

    let mut delay = policy.initial_delay;
    let mut attempt = 1u32;
    let outcome = loop {
        match model
            .invoke(ANALYSIS_SYSTEM_PROMPT, &messages, MAX_ANALYSIS_TOKENS)
            .await
        {
            Ok(analysis) => break Ok(analysis),
            Err(InvokeError::RateLimited) if attempt < policy.max_attempts => {
                tracing::debug!(
                    index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited during bulk analysis; backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => break Err(err),
        }
    };

    match outcome {
        Ok(analysis) => {
            let flagged = analysis.to_uppercase().contains(NEEDS_IMPROVEMENT_MARKER);
            ImprovementRecord {
                utterance: pair.therapist.clone(),
                counter_utterance: pair.patient.clone(),
                analysis,
                flagged,
            }
        }
        Err(err) => {
            tracing::warn!(index, error = %err, "analysis item degraded to fallback");
            ImprovementRecord {
                utterance: pair.therapist.clone(),
                counter_utterance: pair.patient.clone(),
                analysis: fallback_analysis(&err),
                flagged: false,
            }
        }
    }
}

/// Degraded analysis text for an item whose call permanently failed.
fn fallback_analysis(err: &InvokeError) -> String {
    let detail = match err {
        InvokeError::RateLimited => {
            "The AI service is currently busy. This exchange is still covered by the overall report."
        }
        InvokeError::CallFailed(msg) if msg.contains("timed out") || msg.contains("timeout") => {
            "The analysis request timed out. Overall performance is covered in the main report."
        }
        _ => "Please refer to the overall evaluation for guidance on this exchange.",
    };
    format!("Unable to generate detailed analysis at this time. {detail}")
}
