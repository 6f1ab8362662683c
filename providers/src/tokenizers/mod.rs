//! Tokenizers backing the per-provider token accounting.

pub mod heuristic;
pub mod openai;

pub use heuristic::HeuristicTokenizer;
pub use openai::OpenAiTokenizer;
