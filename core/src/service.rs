//! The chat pipeline: clean → validate → trim → invoke.

use thiserror::Error;

use patientsim_context::{BudgetError, ContextBudget, TokenCounter, fit_to_budget};
use patientsim_providers::{InvokeError, ModelInvoker};
use patientsim_types::Message;

use crate::turns::{TurnViolation, clean_history, validate_turns};

/// Reply allowance for one chat turn. Matches the default
/// [`ContextBudget::reply_reserve`] so the window never eats into it.
pub const MAX_REPLY_TOKENS: u32 = 500;

/// Everything that can go wrong with one chat turn, classified.
///
/// Validation and config errors are detected locally and rejected before
/// any network call; invoke errors carry the provider classification
/// through unchanged.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] TurnViolation),
    #[error(transparent)]
    Config(#[from] BudgetError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Drives one simulated-patient chat turn.
///
/// Constructed once at startup; holds no per-conversation state. The caller
/// supplies the full history with every request and owns persistence.
#[derive(Debug)]
pub struct ChatService<M> {
    model: Option<M>,
    counter: TokenCounter,
    budget: ContextBudget,
    max_reply_tokens: u32,
}

impl<M: ModelInvoker> ChatService<M> {
    /// `model` is `None` when the provider was unreachable or unconfigured
    /// at startup; every chat then fails fast with
    /// [`InvokeError::NotReady`] until the process restarts.
    #[must_use]
    pub fn new(model: Option<M>) -> Self {
        if model.is_none() {
            tracing::warn!("chat service started without a model client; chats will fail fast");
        }
        Self {
            model,
            counter: TokenCounter::new(),
            budget: ContextBudget::default(),
            max_reply_tokens: MAX_REPLY_TOKENS,
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_max_reply_tokens(mut self, max_reply_tokens: u32) -> Self {
        self.max_reply_tokens = max_reply_tokens;
        self
    }

    /// Runs one chat turn and returns the patient's reply.
    ///
    /// Within a request the stages are strictly sequential; across requests
    /// there is no shared mutable state and no ordering guarantee.
    pub async fn chat(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<String, ChatError> {
        let cleaned = clean_history(history);
        validate_turns(&cleaned)?;

        let window = fit_to_budget(&cleaned, system_prompt, self.counter, &self.budget)?;

        let model = self.model.as_ref().ok_or(InvokeError::NotReady)?;
        let reply = model
            .invoke(system_prompt, &window, self.max_reply_tokens)
            .await?;

        tracing::debug!(
            context_messages = window.len(),
            "chat turn completed"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatError, ChatService};
    use crate::test_support::ScriptedModel;
    use crate::turns::TurnViolation;
    use patientsim_context::BudgetError;
    use patientsim_providers::InvokeError;
    use patientsim_types::Message;

    fn valid_history() -> Vec<Message> {
        vec![
            Message::user("How have you been?"),
            Message::assistant("Tired, mostly."),
            Message::user("Tell me about that."),
        ]
    }

    #[tokio::test]
    async fn happy_path_returns_reply() {
        let model = ScriptedModel::new(vec![Ok("I just can't sleep.".to_string())]);
        let service = ChatService::new(Some(model));

        let reply = service.chat("persona", &valid_history()).await.unwrap();
        assert_eq!(reply, "I just can't sleep.");
    }

    #[tokio::test]
    async fn model_receives_the_cleaned_window() {
        let model = ScriptedModel::new(vec![Ok("ok".to_string())]);
        let service = ChatService::new(Some(model));

        let mut history = valid_history();
        history.insert(1, Message::assistant("   "));
        service.chat("persona", &history).await.unwrap();

        let calls = service.model.as_ref().unwrap().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], valid_history());
    }

    #[tokio::test]
    async fn validation_failure_skips_the_model_call() {
        let model = ScriptedModel::new(vec![]);
        let service = ChatService::new(Some(model));

        let err = service
            .chat("persona", &[Message::assistant("hey")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatError::Validation(TurnViolation::WrongLastSpeaker)
        ));
        assert!(service.model.as_ref().unwrap().calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_system_prompt_skips_the_model_call() {
        let model = ScriptedModel::new(vec![]);
        let service = ChatService::new(Some(model));
        let prompt = "persona ".repeat(20_000);

        let err = service.chat(&prompt, &valid_history()).await.unwrap_err();

        assert!(matches!(
            err,
            ChatError::Config(BudgetError::SystemPromptTooLarge)
        ));
        assert!(service.model.as_ref().unwrap().calls().is_empty());
    }

    #[tokio::test]
    async fn missing_model_fails_fast_with_not_ready() {
        let service = ChatService::<ScriptedModel>::new(None);

        let err = service.chat("persona", &valid_history()).await.unwrap_err();
        assert!(matches!(err, ChatError::Invoke(InvokeError::NotReady)));
    }

    #[tokio::test]
    async fn validation_runs_even_without_a_model() {
        // Caller input defects stay 4xx-shaped even when the provider is down.
        let service = ChatService::<ScriptedModel>::new(None);

        let err = service.chat("persona", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(TurnViolation::EmptyHistory)
        ));
    }

    #[tokio::test]
    async fn invoke_errors_pass_through() {
        let model = ScriptedModel::new(vec![Err(InvokeError::RateLimited)]);
        let service = ChatService::new(Some(model));

        let err = service.chat("persona", &valid_history()).await.unwrap_err();
        assert!(matches!(err, ChatError::Invoke(InvokeError::RateLimited)));
    }
}
