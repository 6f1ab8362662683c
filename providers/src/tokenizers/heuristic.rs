use cf_core::traits::Tokenizer;
use cf_core::types::ChatMessage;

/// Character-ratio estimate for providers that expose no tokenizer.
///
/// English text averages roughly four characters per token. The estimate
/// rounds up and charges a small fixed overhead per message so that cutoff
/// decisions stay conservative.
pub struct HeuristicTokenizer {
    chars_per_token: usize,
    per_message_overhead: usize,
}

impl HeuristicTokenizer {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4,
            per_message_overhead: 3,
        }
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn token_count(&self, messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .map(|msg| {
                let chars = msg.content.chars().count() + msg.role.to_string().len();
                chars.div_ceil(self.chars_per_token) + self.per_message_overhead
            })
            .sum()
    }
}
