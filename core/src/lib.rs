//! Core pipeline for the simulated-patient service.
//!
//! An inbound chat turn flows validation → trimming → model call, strictly
//! sequential within one request:
//!
//! - [`turns`] - role-alternation validation over the cleaned history.
//! - [`ChatService`] - wires the window, the validator, and the model into
//!   one `chat` operation with a classified error taxonomy.
//! - [`analysis`] - bulk per-utterance analysis with rate-limit backoff and
//!   per-item failure isolation.
//!
//! Nothing here owns persistence: the caller supplies the full history per
//! request, and session state lives in `patientsim-session`.

pub mod analysis;
mod prompts;
mod service;
#[cfg(test)]
mod test_support;
pub mod turns;

pub use analysis::{RetryPolicy, analyze_bulk};
pub use service::{ChatError, ChatService};
pub use turns::{TurnViolation, clean_history, validate_turns};
