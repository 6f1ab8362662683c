//! Provider adapters for the chatflow system.
//!
//! Each adapter translates the generic message list into one provider's wire
//! format and back, and carries the token accounting for its model. Adapters
//! are stateless per call; retry budgets are consumed by the orchestrator,
//! not here.

pub mod local;
pub mod mock;
pub mod openai;
pub mod tokenizers;

pub use local::{LocalConfig, LocalProvider};
pub use mock::{MockProvider, MockReply};
pub use openai::{OpenAiConfig, OpenAiProvider, model_token_limit};
pub use tokenizers::{HeuristicTokenizer, OpenAiTokenizer};
