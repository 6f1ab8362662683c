//! Scripted provider for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use cf_core::traits::{ChatProvider, Tokenizer};
use cf_core::types::ChatMessage;
use errors::ProviderError;

use crate::tokenizers::HeuristicTokenizer;

/// One scripted outcome for a [`MockProvider`] call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Unavailable(String),
    ApiError { status: u16, message: String },
}

/// Replays a fixed script of replies and records every request it receives.
///
/// When the script runs dry the provider keeps returning the last scripted
/// text, or errors if the script never contained one.
pub struct MockProvider {
    provider_id: String,
    token_limit: usize,
    retries: u32,
    tokenizer: HeuristicTokenizer,
    script: Mutex<VecDeque<MockReply>>,
    last_text: Mutex<Option<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            token_limit: 4_096,
            retries: 0,
            tokenizer: HeuristicTokenizer::new(),
            script: Mutex::new(VecDeque::new()),
            last_text: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_token_limit(mut self, token_limit: usize) -> Self {
        self.token_limit = token_limit;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn reply_with(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()))
    }

    pub fn then_unavailable(self, reason: impl Into<String>) -> Self {
        self.push(MockReply::Unavailable(reason.into()))
    }

    pub fn then_api_error(self, status: u16, message: impl Into<String>) -> Self {
        self.push(MockReply::ApiError {
            status,
            message: message.into(),
        })
    }

    fn push(self, reply: MockReply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The message slices passed to each completion call, in order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn token_limit(&self) -> usize {
        self.token_limit
    }

    fn retries_on_service_error(&self) -> u32 {
        self.retries
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        &self.tokenizer
    }

    async fn completion(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(MockReply::Text(text)) => {
                *self.last_text.lock().unwrap() = Some(text.clone());
                Ok(text)
            }
            Some(MockReply::Unavailable(reason)) => Err(ProviderError::ServiceUnavailable {
                provider_id: self.provider_id.clone(),
                reason,
            }),
            Some(MockReply::ApiError { status, message }) => {
                Err(ProviderError::Api { status, message })
            }
            None => match self.last_text.lock().unwrap().clone() {
                Some(text) => Ok(text),
                None => Err(ProviderError::EmptyResponse),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::types::Role;

    #[tokio::test]
    async fn replays_the_script_in_order() {
        let provider = MockProvider::new("mock")
            .reply_with("first")
            .then_unavailable("overloaded")
            .reply_with("second");

        let messages = [ChatMessage::new("mock", Role::User, "hi")];
        assert_eq!(provider.completion(&messages).await.unwrap(), "first");
        assert!(
            provider
                .completion(&messages)
                .await
                .unwrap_err()
                .is_service_unavailable()
        );
        assert_eq!(provider.completion(&messages).await.unwrap(), "second");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_script_repeats_the_last_text() {
        let provider = MockProvider::new("mock").reply_with("only");
        let messages = [ChatMessage::new("mock", Role::User, "hi")];
        provider.completion(&messages).await.unwrap();
        assert_eq!(provider.completion(&messages).await.unwrap(), "only");
    }

    #[tokio::test]
    async fn records_the_messages_it_was_sent() {
        let provider = MockProvider::new("mock").reply_with("ok");
        let messages = [ChatMessage::new("mock", Role::User, "what is up")];
        provider.completion(&messages).await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, "what is up");
    }
}
