//! Currency disambiguation backed by the text model

use action_primitives::{MatcherError, OptionMatcher};
use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::TextModel;

const SYSTEM_PROMPT: &str = "You are a precise extraction assistant. Given a user currency hint \
and a list of official currency display names, return exactly one item from the list that best \
matches the hint. Return ONLY the chosen list string, nothing else.";

/// Asks the model for one verbatim catalog label.
pub struct LlmOptionMatcher {
    model: Arc<dyn TextModel>,
}

impl LlmOptionMatcher {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

pub fn user_message(hint: &str, labels: &[String]) -> String {
    format!("User hint: {hint}\nList: {labels:?}\nReturn exactly one item from the list.")
}

#[async_trait]
impl OptionMatcher for LlmOptionMatcher {
    async fn choose(&self, hint: &str, labels: &[String]) -> Result<String, MatcherError> {
        let reply = self
            .model
            .complete(SYSTEM_PROMPT, &user_message(hint, labels))
            .await
            .map_err(|err| MatcherError::Unavailable(err.to_string()))?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(MatcherError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}
