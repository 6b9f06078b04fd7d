//! Context window management for the simulated-patient service.
//!
//! Two pieces live here:
//!
//! - [`TokenCounter`] - approximate token counting with a deterministic
//!   heuristic fallback when the tokenizer is unavailable.
//! - [`fit_to_budget`] - trims an ordered message history to a fixed
//!   [`ContextBudget`], preserving the most recent turns exactly and
//!   degrading only the oldest retained one.

mod budget;
mod token_counter;
mod window;

pub use budget::{BudgetError, ContextBudget};
pub use token_counter::TokenCounter;
pub use window::fit_to_budget;
