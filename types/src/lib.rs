//! Core domain types for the simulated-patient service.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the service.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
///
/// `User` is the human-originated role (the therapist in training);
/// `Assistant` is the model-originated role (the simulated patient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire-format role name, as sent to the inference endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation turn.
///
/// Messages are insertion-order-preserving within a history; content is
/// immutable once appended except for window truncation rewriting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One therapist utterance queued for bulk analysis, paired with the
/// patient reply it drew (if any) and a short transcript snippet of the
/// turns preceding it. Assembled by the caller from stored history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtterancePair {
    /// The therapist message under analysis.
    pub therapist: String,
    /// The patient's reply to it, empty when the session ended first.
    pub patient: String,
    /// Preceding context, already flattened to a short string.
    pub context: String,
}

impl UtterancePair {
    #[must_use]
    pub fn new(
        therapist: impl Into<String>,
        patient: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            therapist: therapist.into(),
            patient: patient.into(),
            context: context.into(),
        }
    }
}

/// Per-utterance outcome of bulk analysis.
///
/// Produced one per qualifying therapist utterance; records are independent
/// of each other and transient (returned to the caller, never persisted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementRecord {
    /// The therapist message that was analyzed.
    pub utterance: String,
    /// The patient reply it drew.
    pub counter_utterance: String,
    /// Model analysis text, or a degraded fallback when the call failed.
    pub analysis: String,
    /// True when the analysis flagged the utterance as needing improvement.
    /// Always false for fallback records.
    pub flagged: bool,
}
