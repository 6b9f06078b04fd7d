//! Scripted model fake shared by the pipeline tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use patientsim_providers::{InvokeError, ModelInvoker};
use patientsim_types::Message;

/// Replays a fixed sequence of outcomes and records every call's messages.
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, InvokeError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<Result<String, InvokeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Message lists received so far, in call order.
    pub(crate) fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ModelInvoker for ScriptedModel {
    fn invoke(
        &self,
        _system_prompt: &str,
        messages: &[Message],
        _max_tokens: u32,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("STATUS: GOOD".to_string()));
        async move { next }
    }
}
