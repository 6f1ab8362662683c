//! # Chatflow Errors
//!
//! Error taxonomy for the chatflow system, one enum per layer:
//!
//! - [`ProviderError`] — failures raised by a chat provider adapter. Exactly
//!   one variant ([`ProviderError::ServiceUnavailable`]) is transient and
//!   drives the orchestrator retry loop; everything else aborts immediately.
//! - [`MemoryError`] — failures raised by a memory store. "Not found" on load
//!   is normalized away inside the store (fresh-state initialization) and is
//!   never surfaced through this enum.
//! - [`InvalidResponse`] — a rejected completion. Its display form is fed back
//!   to the model as the next prompt by the auto-fixer loop.
//! - [`FlowError`] — everything the orchestrator can return to a caller.

use thiserror::Error;

/// Errors raised by a chat provider adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider signalled transient unavailability (HTTP 503).
    /// The only retryable provider condition.
    #[error("provider {provider_id} unavailable: {reason}")]
    ServiceUnavailable { provider_id: String, reason: String },

    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("provider returned no choices")]
    EmptyResponse,

    #[error("token limit not known for model {model}")]
    UnsupportedModel { model: String },
}

impl ProviderError {
    /// True only for the transient condition the orchestrator may retry.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, ProviderError::ServiceUnavailable { .. })
    }
}

/// Errors raised by a memory store or the in-memory history layer.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("{backend} store error: {reason}")]
    Backend { backend: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message not found in history: {id}")]
    MessageNotFound { id: String },

    /// The most recent message alone exceeds the token budget, so no
    /// non-empty window fits. Raised instead of silently sending an empty
    /// request.
    #[error("most recent message exceeds the token limit of {token_limit}")]
    ContextOverflow { token_limit: usize },
}

/// A completion rejected by an auto-fixer. The feedback doubles as the next
/// prompt so the model sees its own correction request.
#[derive(Debug, Error)]
#[error("{feedback}")]
pub struct InvalidResponse {
    pub feedback: String,
}

impl InvalidResponse {
    pub fn new(feedback: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
        }
    }
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum FlowError {
    // Configuration errors: raised at construction, never retried.
    #[error("invalid providers: {reason}")]
    InvalidProviders { reason: String },

    // Lookup errors: raised synchronously, never retried.
    #[error("no provider found with provider_id {provider_id}")]
    ProviderNotFound { provider_id: String },

    #[error(
        "a provider_id is required because more than one provider is configured"
    )]
    ProviderMissingInCompletion,

    /// Transient unavailability survived the whole retry budget.
    #[error("provider {provider_id} unavailable after {attempts} attempts")]
    ServiceUnavailable {
        provider_id: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The auto-fixer rejected every attempt.
    #[error("response still invalid after {attempts} attempts")]
    AutoFixExhausted {
        attempts: u32,
        #[source]
        source: InvalidResponse,
    },

    #[error("invalid function call: {reason}")]
    InvalidFunctionCall { reason: String },

    #[error("prompt template rendering failed: {reason}")]
    Template { reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
