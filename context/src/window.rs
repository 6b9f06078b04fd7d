//! Conversation window trimming.
//!
//! LLM context windows are hard limits. Naive front-truncation loses the
//! most recent turns, which are the most relevant; this policy walks the
//! history newest-to-oldest, keeps every message that fits, and truncates at
//! most the one boundary message rather than dropping it outright. No
//! message is ever dropped from the middle while a newer one is kept.

use patientsim_types::Message;

use crate::budget::{BudgetError, ContextBudget};
use crate::token_counter::TokenCounter;

/// Marker appended to a truncated boundary message.
const ELLIPSIS: &str = "...";

/// Trims `messages` (oldest first) to fit `budget`, returning the kept
/// suffix restored to chronological order.
///
/// Fails only when the system prompt is too large relative to the budget to
/// leave room for any context. Below budget the input is returned unchanged;
/// the operation is idempotent on already-fitted histories.
pub fn fit_to_budget(
    messages: &[Message],
    system_prompt: &str,
    counter: TokenCounter,
    budget: &ContextBudget,
) -> Result<Vec<Message>, BudgetError> {
    let available = budget.available(counter.count_str(system_prompt))?;

    let mut kept: Vec<Message> = Vec::with_capacity(messages.len());
    let mut total: u32 = 0;

    for msg in messages.iter().rev() {
        let cost = counter.count_message(msg);
        if total + cost > available {
            // Boundary message: truncate rather than drop, then stop.
            let max_chars = (f64::from(available) * budget.chars_per_token) as usize;
            if max_chars > budget.min_truncate_chars {
                let mut content = truncate_chars(&msg.content, max_chars);
                content.push_str(ELLIPSIS);
                let cost = counter.count_str(&content);
                if total + cost <= available {
                    kept.push(Message::new(msg.role, content));
                    total += cost;
                }
            }
            break;
        }
        kept.push(msg.clone());
        total += cost;
    }

    tracing::debug!(
        kept = kept.len(),
        dropped = messages.len() - kept.len(),
        tokens = total,
        available,
        "fitted conversation window"
    );

    kept.reverse();
    Ok(kept)
}

/// First `max_chars` characters of `text`, cut on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
