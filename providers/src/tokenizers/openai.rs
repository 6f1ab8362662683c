//! OpenAI token accounting on tiktoken.
//!
//! Replicates the official per-message formula: a fixed per-message overhead
//! plus the encoded lengths of role, content and (when present) name, plus a
//! fixed reply-priming overhead. The cutoff depends on this matching the
//! upstream accounting exactly, otherwise truncation under- or over-cuts.

use cf_core::traits::Tokenizer;
use cf_core::types::ChatMessage;
use tiktoken_rs::CoreBPE;

pub struct OpenAiTokenizer {
    bpe: CoreBPE,
    tokens_per_message: isize,
    tokens_per_name: isize,
}

impl OpenAiTokenizer {
    pub fn new(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model).unwrap_or_else(|_| {
            tracing::warn!(model, "model not known to tiktoken, using cl100k_base");
            tiktoken_rs::cl100k_base().expect("cl100k_base encoding is bundled")
        });

        // gpt-3.5-turbo-0301 frames messages as
        // <|start|>{role/name}\n{content}<|end|>\n; a name replaces the role.
        let (tokens_per_message, tokens_per_name) = if model == "gpt-3.5-turbo-0301" {
            (4, -1)
        } else {
            (3, 1)
        };

        Self {
            bpe,
            tokens_per_message,
            tokens_per_name,
        }
    }

    fn encoded_len(&self, text: &str) -> isize {
        self.bpe.encode_with_special_tokens(text).len() as isize
    }

    fn message_tokens(&self, role: &str, content: &str, name: Option<&str>) -> isize {
        let mut tokens = self.tokens_per_message;
        tokens += self.encoded_len(role);
        tokens += self.encoded_len(content);
        if let Some(name) = name {
            tokens += self.encoded_len(name) + self.tokens_per_name;
        }
        tokens
    }
}

impl Tokenizer for OpenAiTokenizer {
    fn token_count(&self, messages: &[ChatMessage]) -> usize {
        let mut total: isize = 0;
        for msg in messages {
            total += self.message_tokens(&msg.role.to_string(), &msg.content, None);
        }
        // Every reply is primed with <|start|>assistant<|message|>.
        total += 3;
        total.max(0) as usize
    }
}
