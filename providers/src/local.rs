//! Adapter for a locally hosted model served over the Ollama chat API.

use async_trait::async_trait;
use cf_core::traits::{ChatProvider, Tokenizer};
use cf_core::types::{ChatMessage, ProviderMessage};
use errors::ProviderError;
use serde::{Deserialize, Serialize};

use crate::tokenizers::HeuristicTokenizer;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_PROVIDER_ID: &str = "local";
const DEFAULT_TOKEN_LIMIT: usize = 2_048;

/// Configuration for [`LocalProvider`].
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub provider_id: Option<String>,
    /// Local runtimes expose no reliable limit, so it is caller-supplied.
    pub token_limit: Option<usize>,
    pub retries_on_service_error: u32,
}

impl LocalConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: None,
            provider_id: None,
            token_limit: None,
            retries_on_service_error: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct LocalChatRequest<'a> {
    model: &'a str,
    messages: Vec<ProviderMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct LocalChatResponse {
    message: LocalChatMessage,
}

#[derive(Debug, Deserialize)]
struct LocalChatMessage {
    content: String,
}

/// Adapter for an Ollama-compatible local model server.
pub struct LocalProvider {
    config: LocalConfig,
    provider_id: String,
    token_limit: usize,
    tokenizer: HeuristicTokenizer,
    http: reqwest::Client,
}

impl LocalProvider {
    pub fn new(config: LocalConfig) -> Self {
        let provider_id = config
            .provider_id
            .clone()
            .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());
        let token_limit = config.token_limit.unwrap_or(DEFAULT_TOKEN_LIMIT);
        Self {
            config,
            provider_id,
            token_limit,
            tokenizer: HeuristicTokenizer::new(),
            http: reqwest::Client::new(),
        }
    }

    fn chat_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/api/chat")
    }
}

#[async_trait]
impl ChatProvider for LocalProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn token_limit(&self) -> usize {
        self.token_limit
    }

    fn retries_on_service_error(&self) -> u32 {
        self.config.retries_on_service_error
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        &self.tokenizer
    }

    async fn completion(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = LocalChatRequest {
            model: &self.config.model,
            messages: messages.iter().map(ProviderMessage::from).collect(),
            stream: false,
        };

        let response = self
            .http
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                reason: err.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let reason = response.text().await.unwrap_or_default();
            return Err(ProviderError::ServiceUnavailable {
                provider_id: self.provider_id.clone(),
                reason,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: LocalChatResponse =
            response.json().await.map_err(|err| ProviderError::Transport {
                reason: err.to_string(),
            })?;

        if parsed.message.content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_a_stock_ollama_install() {
        let provider = LocalProvider::new(LocalConfig::new("llama3"));
        assert_eq!(provider.provider_id(), "local");
        assert_eq!(provider.token_limit(), 2_048);
        assert_eq!(provider.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let mut config = LocalConfig::new("llama3");
        config.base_url = Some("http://models.internal:8080/".to_string());
        let provider = LocalProvider::new(config);
        assert_eq!(provider.chat_url(), "http://models.internal:8080/api/chat");
    }
}
