//! The conversation orchestrator.

use cf_core::traits::ChatProvider;
use cf_core::types::{ChatMessage, Role};
use errors::{FlowError, InvalidResponse};
use memory::MessageHistory;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::function::{Function, FunctionInvocation};
use crate::templates;

/// Tokens reserved for the model's reply when computing the request budget.
pub const DEFAULT_TOKEN_OFFSET: usize = 16;

/// One conversation over a fixed set of providers.
///
/// The flow owns the message history and every mutation of it. Providers are
/// addressed by their `provider_id`; when exactly one provider is configured
/// the id may be omitted per call.
pub struct Flow {
    providers: Vec<Box<dyn ChatProvider>>,
    history: MessageHistory,
    token_offset: usize,
}

impl Flow {
    /// Fails with [`FlowError::InvalidProviders`] on an empty provider set or
    /// duplicate provider ids.
    pub fn new(
        providers: Vec<Box<dyn ChatProvider>>,
        history: MessageHistory,
    ) -> Result<Self, FlowError> {
        if providers.is_empty() {
            return Err(FlowError::InvalidProviders {
                reason: "at least one provider must be configured".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.provider_id().to_string()) {
                return Err(FlowError::InvalidProviders {
                    reason: format!(
                        "provider_id {} is configured more than once",
                        provider.provider_id()
                    ),
                });
            }
        }
        Ok(Self {
            providers,
            history,
            token_offset: DEFAULT_TOKEN_OFFSET,
        })
    }

    /// A flow with a process-memory history under a random conversation id.
    pub fn ephemeral(providers: Vec<Box<dyn ChatProvider>>) -> Result<Self, FlowError> {
        let history = MessageHistory::ephemeral(Uuid::new_v4().to_string());
        Self::new(providers, history)
    }

    /// Overrides the reply-budget reservation subtracted from each provider's
    /// token limit before the history cutoff.
    pub fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.token_offset = token_offset;
        self
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Sends the prompt and appends the exchange to the history.
    ///
    /// The user message is inserted before the provider call so the cutoff
    /// window includes it; if anything afterwards fails the user message is
    /// removed again, leaving the history exactly as it was.
    pub async fn completion(
        &mut self,
        prompt: &str,
        provider_id: Option<&str>,
    ) -> Result<String, FlowError> {
        let index = self.resolve_provider_index(provider_id)?;
        let pid = self.providers[index].provider_id().to_string();

        let user_message = ChatMessage::new(&pid, Role::User, prompt);
        let user_id = user_message.id;
        self.history.insert_message(user_message).await?;

        match self.complete_once(index).await {
            Ok(response) => {
                self.history
                    .insert_message(ChatMessage::new(&pid, Role::Assistant, &response))
                    .await?;
                Ok(response)
            }
            Err(err) => {
                if let Err(rollback_err) = self.history.remove_message(user_id).await {
                    tracing::error!(error = %rollback_err, "failed to roll back user message");
                }
                Err(err)
            }
        }
    }

    /// Completion with a validation loop.
    ///
    /// The `auto_fixer` inspects each raw response and either returns the
    /// accepted (possibly parsed) value or rejects it with feedback. On
    /// rejection, the failed assistant reply and the feedback are inserted as
    /// temporary messages so the model sees its own correction request on the
    /// next attempt. Success prunes every temporary message; after
    /// `auto_fixer_retries` extra attempts the loop fails with
    /// [`FlowError::AutoFixExhausted`], leaving the failed exchanges in the
    /// history for inspection.
    pub async fn completion_with_auto_fixer<T, F>(
        &mut self,
        prompt: &str,
        auto_fixer: F,
        auto_fixer_retries: u32,
        provider_id: Option<&str>,
    ) -> Result<(String, T), FlowError>
    where
        F: Fn(&str) -> Result<T, InvalidResponse>,
    {
        let index = self.resolve_provider_index(provider_id)?;
        let pid = self.providers[index].provider_id().to_string();

        self.history
            .insert_message(ChatMessage::new(&pid, Role::User, prompt))
            .await?;

        let attempts = auto_fixer_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.complete_once(index).await?;
            match auto_fixer(&response) {
                Ok(result) => {
                    self.history
                        .insert_message(ChatMessage::new(&pid, Role::Assistant, &response))
                        .await?;
                    self.history.clean_temporary_messages().await?;
                    return Ok((response, result));
                }
                Err(rejection) => {
                    tracing::warn!(
                        attempt,
                        feedback = %rejection,
                        "response rejected, reprompting with feedback"
                    );
                    self.history
                        .insert_message(ChatMessage::temporary(&pid, Role::Assistant, &response))
                        .await?;
                    if attempt >= attempts {
                        return Err(FlowError::AutoFixExhausted {
                            attempts,
                            source: rejection,
                        });
                    }
                    self.history
                        .insert_message(ChatMessage::temporary(
                            &pid,
                            Role::User,
                            rejection.feedback.clone(),
                        ))
                        .await?;
                }
            }
        }
    }

    /// Completion parsed into `T` via its JSON schema.
    ///
    /// The prompt is wrapped with the schema of `T` and the reply is parsed
    /// with serde, going through the auto-fixer loop on parse failures.
    pub async fn completion_with_output_formatter<T>(
        &mut self,
        prompt: &str,
        auto_fix_retries: u32,
        provider_id: Option<&str>,
    ) -> Result<T, FlowError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = schemars::schema_for!(T);
        let formatted = templates::render_output_formatter(prompt, &schema.to_value().to_string())?;

        let fixer = |response: &str| {
            serde_json::from_str::<T>(response).map_err(|err| {
                InvalidResponse::new(format!(
                    "The response is invalid ({err}). Respond with a single JSON object that \
                     adheres to the JSON schema specified in the previous request."
                ))
            })
        };

        let (_, parsed) = self
            .completion_with_auto_fixer(&formatted, fixer, auto_fix_retries, provider_id)
            .await?;
        Ok(parsed)
    }

    /// Completion in which the model may (or, with `require_function_call`,
    /// must) invoke one of `functions`.
    ///
    /// The reply is parsed as a `{name, arguments}` envelope; the arguments
    /// are validated against the matched function's parameter schema inside
    /// the auto-fixer loop, so a malformed invocation is fed back as a
    /// correction prompt. Once an invocation is accepted the handler runs and
    /// its value is returned. In optional mode a reply that is not an
    /// invocation envelope is returned as [`Value::String`].
    pub async fn completion_with_functions(
        &mut self,
        prompt: &str,
        functions: &[Function],
        require_function_call: bool,
        auto_fix_retries: u32,
        provider_id: Option<&str>,
    ) -> Result<Value, FlowError> {
        enum Accepted {
            Call { index: usize, arguments: Value },
            Plain(String),
        }

        let formatted = if require_function_call {
            templates::render_required_functions(prompt, functions)?
        } else {
            templates::render_optional_functions(prompt, functions)?
        };

        let fixer = |response: &str| -> Result<Accepted, InvalidResponse> {
            let invocation: FunctionInvocation = match serde_json::from_str(response) {
                Ok(invocation) => invocation,
                Err(_) if !require_function_call => {
                    return Ok(Accepted::Plain(response.to_string()));
                }
                Err(_) => {
                    return Err(InvalidResponse::new(
                        "Please provide a function invocation that adheres to the format \
                         specified in the previous request.",
                    ));
                }
            };
            let index = functions
                .iter()
                .position(|f| f.name() == invocation.name)
                .ok_or_else(|| {
                    InvalidResponse::new(format!(
                        "No function named {} is available. Invoke one of the listed functions.",
                        invocation.name
                    ))
                })?;
            functions[index]
                .validate_arguments(&invocation.arguments)
                .map_err(InvalidResponse::new)?;
            Ok(Accepted::Call {
                index,
                arguments: invocation.arguments,
            })
        };

        let (_, accepted) = self
            .completion_with_auto_fixer(&formatted, fixer, auto_fix_retries, provider_id)
            .await?;

        match accepted {
            Accepted::Plain(text) => Ok(Value::String(text)),
            Accepted::Call { index, arguments } => functions[index].invoke(arguments),
        }
    }

    /// Deletes the conversation's backend state. The explicit scope-exit for
    /// non-persistent conversations; idempotent.
    pub async fn cleanup(&mut self) -> Result<(), FlowError> {
        self.history.cleanup().await?;
        Ok(())
    }

    /// Cutoff plus the retry loop for one provider call.
    async fn complete_once(&self, index: usize) -> Result<String, FlowError> {
        let provider = self.providers[index].as_ref();
        let budget = provider.token_limit().saturating_sub(self.token_offset);
        let window = self
            .history
            .history_upto_token_limit(budget, provider.tokenizer())?;
        Self::prompt_provider_with_retry(provider, &window).await
    }

    /// Calls the provider up to `retries_on_service_error + 1` times. Only
    /// transient unavailability is retried; any other error aborts at once.
    async fn prompt_provider_with_retry(
        provider: &dyn ChatProvider,
        messages: &[ChatMessage],
    ) -> Result<String, FlowError> {
        let attempts = provider.retries_on_service_error() + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match provider.completion(messages).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_service_unavailable() && attempt < attempts => {
                    tracing::warn!(
                        provider_id = provider.provider_id(),
                        attempt,
                        error = %err,
                        "provider unavailable, retrying"
                    );
                }
                Err(err) if err.is_service_unavailable() => {
                    tracing::warn!(
                        provider_id = provider.provider_id(),
                        attempt,
                        error = %err,
                        "provider unavailable, retry budget exhausted"
                    );
                    return Err(FlowError::ServiceUnavailable {
                        provider_id: provider.provider_id().to_string(),
                        attempts,
                        source: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn resolve_provider_index(&self, provider_id: Option<&str>) -> Result<usize, FlowError> {
        match provider_id {
            None if self.providers.len() == 1 => Ok(0),
            None => Err(FlowError::ProviderMissingInCompletion),
            Some(id) => self
                .providers
                .iter()
                .position(|p| p.provider_id() == id)
                .ok_or_else(|| FlowError::ProviderNotFound {
                    provider_id: id.to_string(),
                }),
        }
    }
}

impl std::fmt::Display for Flow {
    /// One `role: content` line per message, conversation order.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.history.fmt(f)
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider_ids: Vec<&str> = self.providers.iter().map(|p| p.provider_id()).collect();
        f.debug_struct("Flow")
            .field("chat_id", &self.history.chat_id())
            .field("providers", &provider_ids)
            .field("token_offset", &self.token_offset)
            .finish_non_exhaustive()
    }
}
