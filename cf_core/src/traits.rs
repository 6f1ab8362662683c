//! Core traits for the chatflow system.

use async_trait::async_trait;
use errors::ProviderError;

use crate::types::ChatMessage;

/// Token counting bound to a specific model's accounting.
///
/// The orchestrator's cutoff walks the history newest-to-oldest and charges
/// each candidate message via `token_count(&[msg])`, so implementations must
/// price a single message the way the upstream model bills it (including any
/// fixed per-message and reply-priming overhead). Getting this wrong makes
/// context-window truncation under- or over-cut.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens the given messages consume in a request.
    fn token_count(&self, messages: &[ChatMessage]) -> usize;
}

/// A chat provider adapter.
///
/// Adapters are stateless with respect to conversation data: they receive a
/// slice of history per call and own no history themselves. Exactly one
/// failure condition is distinguished — [`ProviderError::ServiceUnavailable`]
/// — which the orchestrator retries up to [`retries_on_service_error`]
/// additional times. Every other error propagates unmodified.
///
/// [`retries_on_service_error`]: ChatProvider::retries_on_service_error
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Unique id within the set of providers used by one orchestrator.
    fn provider_id(&self) -> &str;

    /// Context-window size in model tokens.
    fn token_limit(&self) -> usize;

    /// Retry budget consumed by the orchestrator's retry loop, not by the
    /// adapter itself.
    fn retries_on_service_error(&self) -> u32 {
        0
    }

    /// The tokenizer matching this provider's model.
    fn tokenizer(&self) -> &dyn Tokenizer;

    /// Translate the message list into the provider's wire format, invoke the
    /// provider, and return the text of the primary choice.
    async fn completion(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
