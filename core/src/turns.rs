//! Turn-taking validation.
//!
//! Enforced before any model call: the history must be non-empty, roles
//! must alternate, and the therapist must speak last. Checks run in order;
//! the first violation wins. Each violation maps to its own user-facing
//! message and is never retried.

use thiserror::Error;

use patientsim_types::{Message, Role};

/// Caller input defect detected before any network call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TurnViolation {
    #[error("history is empty")]
    EmptyHistory,
    #[error("wait for the patient's reply before sending another message")]
    ConsecutiveSameRole,
    #[error("the therapist must speak last")]
    WrongLastSpeaker,
}

/// Normalizes a caller-supplied history: trims surrounding whitespace and
/// drops empty entries. [`validate_turns`] assumes its input went through
/// this.
#[must_use]
pub fn clean_history(history: &[Message]) -> Vec<Message> {
    history
        .iter()
        .filter(|msg| !msg.content.trim().is_empty())
        .map(|msg| Message::new(msg.role, msg.content.trim()))
        .collect()
}

/// Validates role alternation over an ordered, cleaned message list.
pub fn validate_turns(messages: &[Message]) -> Result<(), TurnViolation> {
    if messages.is_empty() {
        return Err(TurnViolation::EmptyHistory);
    }

    for pair in messages.windows(2) {
        if pair[0].role == pair[1].role {
            return Err(TurnViolation::ConsecutiveSameRole);
        }
    }

    // The system must never generate a reply to its own last utterance.
    if messages[messages.len() - 1].role != Role::User {
        return Err(TurnViolation::WrongLastSpeaker);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{TurnViolation, clean_history, validate_turns};
    use patientsim_types::Message;

    #[test]
    fn empty_history_is_rejected() {
        assert_eq!(validate_turns(&[]), Err(TurnViolation::EmptyHistory));
    }

    #[test]
    fn consecutive_same_role_is_rejected() {
        let history = vec![Message::user("hi"), Message::user("there")];
        assert_eq!(
            validate_turns(&history),
            Err(TurnViolation::ConsecutiveSameRole)
        );
    }

    #[test]
    fn assistant_speaking_last_is_rejected() {
        let history = vec![Message::user("hi"), Message::assistant("hey")];
        assert_eq!(
            validate_turns(&history),
            Err(TurnViolation::WrongLastSpeaker)
        );
    }

    #[test]
    fn assistant_first_then_user_is_accepted() {
        let history = vec![Message::assistant("hi"), Message::user("hello")];
        assert_eq!(validate_turns(&history), Ok(()));
    }

    #[test]
    fn single_user_message_is_accepted() {
        assert_eq!(validate_turns(&[Message::user("hello")]), Ok(()));
    }

    #[test]
    fn first_violation_wins() {
        // Both consecutive-same-role and wrong-last-speaker are present;
        // the adjacency check fires first.
        let history = vec![
            Message::user("hi"),
            Message::assistant("hey"),
            Message::assistant("still here"),
        ];
        assert_eq!(
            validate_turns(&history),
            Err(TurnViolation::ConsecutiveSameRole)
        );
    }

    #[test]
    fn clean_history_trims_and_drops_empty() {
        let history = vec![
            Message::user("  hi  "),
            Message::assistant("   "),
            Message::user(""),
            Message::assistant("\they\n"),
        ];

        let cleaned = clean_history(&history);

        assert_eq!(
            cleaned,
            vec![Message::user("hi"), Message::assistant("hey")]
        );
    }

    #[test]
    fn whitespace_only_history_cleans_to_empty_and_is_rejected() {
        let history = vec![Message::user("   "), Message::assistant("\n")];
        let cleaned = clean_history(&history);
        assert_eq!(validate_turns(&cleaned), Err(TurnViolation::EmptyHistory));
    }
}
