//! OpenAI chat-completions adapter.

use async_trait::async_trait;
use cf_core::traits::{ChatProvider, Tokenizer};
use cf_core::types::{ChatMessage, ProviderMessage};
use errors::ProviderError;
use serde::{Deserialize, Serialize};

use crate::tokenizers::OpenAiTokenizer;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PROVIDER_ID: &str = "chatgpt";

/// Context-window size for a known OpenAI chat model.
///
/// Rolling aliases (`gpt-4`, `gpt-3.5-turbo`) resolve to their dated snapshot
/// with a warning, since the number may change underneath the alias. Unknown
/// models are an error rather than a guess.
pub fn model_token_limit(model: &str) -> Result<usize, ProviderError> {
    let limit = match model {
        "gpt-4-32k-0613" | "gpt-4-32k-0314" => 32_768,
        "gpt-4-0314" | "gpt-4-0613" => 8_192,
        "gpt-3.5-turbo-0613" | "gpt-3.5-turbo-0301" => 4_096,
        "gpt-3.5-turbo-16k-0613" => 16_384,
        "gpt-4" => {
            tracing::warn!(model, "rolling alias, assuming the gpt-4-0613 token limit");
            8_192
        }
        "gpt-3.5-turbo" => {
            tracing::warn!(
                model,
                "rolling alias, assuming the gpt-3.5-turbo-0613 token limit"
            );
            4_096
        }
        other => {
            return Err(ProviderError::UnsupportedModel {
                model: other.to_string(),
            });
        }
    };
    Ok(limit)
}

/// Configuration for [`OpenAiProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// Overrides the public endpoint, for proxies and tests.
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub provider_id: Option<String>,
    pub retries_on_service_error: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub n: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub logit_bias: Option<std::collections::HashMap<String, f32>>,
    pub user: Option<String>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            organization: None,
            provider_id: None,
            retries_on_service_error: 0,
            temperature: None,
            top_p: None,
            n: None,
            max_tokens: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            logit_bias: None,
            user: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ProviderMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<&'a std::collections::HashMap<String, f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Adapter for the OpenAI chat completions API.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    provider_id: String,
    token_limit: usize,
    tokenizer: OpenAiTokenizer,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let token_limit = model_token_limit(&config.model)?;
        let tokenizer = OpenAiTokenizer::new(&config.model);
        let provider_id = config
            .provider_id
            .clone()
            .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());
        Ok(Self {
            config,
            provider_id,
            token_limit,
            tokenizer,
            http: reqwest::Client::new(),
        })
    }

    fn completions_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
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
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: messages.iter().map(ProviderMessage::from).collect(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            n: self.config.n,
            max_tokens: self.config.max_tokens,
            stop: self.config.stop.as_deref(),
            presence_penalty: self.config.presence_penalty,
            frequency_penalty: self.config.frequency_penalty,
            logit_bias: self.config.logit_bias.as_ref(),
            user: self.config.user.as_deref(),
        };

        let mut request = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(org) = &self.config.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request
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

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|err| ProviderError::Transport {
                reason: err.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_snapshots_resolve_without_warning() {
        assert_eq!(model_token_limit("gpt-4-32k-0613").unwrap(), 32_768);
        assert_eq!(model_token_limit("gpt-4-0314").unwrap(), 8_192);
        assert_eq!(model_token_limit("gpt-3.5-turbo-0301").unwrap(), 4_096);
        assert_eq!(model_token_limit("gpt-3.5-turbo-16k-0613").unwrap(), 16_384);
    }

    #[test]
    fn rolling_aliases_resolve_to_their_snapshot() {
        assert_eq!(model_token_limit("gpt-4").unwrap(), 8_192);
        assert_eq!(model_token_limit("gpt-3.5-turbo").unwrap(), 4_096);
    }

    #[test]
    fn unknown_models_are_rejected() {
        let err = model_token_limit("gpt-9000").unwrap_err();
        assert!(matches!(
            err,
            ProviderError::UnsupportedModel { model } if model == "gpt-9000"
        ));
    }

    #[test]
    fn provider_id_defaults_to_chatgpt() {
        let provider =
            OpenAiProvider::new(OpenAiConfig::new("sk-test", "gpt-3.5-turbo-0613")).unwrap();
        assert_eq!(provider.provider_id(), "chatgpt");
        assert_eq!(provider.token_limit(), 4_096);
        assert_eq!(provider.retries_on_service_error(), 0);
    }

    #[test]
    fn sampling_params_are_omitted_when_unset() {
        let body = ChatCompletionRequest {
            model: "gpt-3.5-turbo-0613",
            messages: vec![],
            temperature: None,
            top_p: None,
            n: None,
            max_tokens: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            logit_bias: None,
            user: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "gpt-3.5-turbo-0613", "messages": []})
        );
    }
}
