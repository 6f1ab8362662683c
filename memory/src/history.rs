//! The in-memory message log and its token-budget cutoff.

use cf_core::traits::Tokenizer;
use cf_core::types::ChatMessage;
use errors::MemoryError;
use uuid::Uuid;

use crate::stores::{EphemeralStore, MemoryStore};

/// The ordered message log for one conversation.
///
/// The in-memory list is authoritative for reads; every mutation goes to the
/// list first and is then mirrored to the store. Messages are immutable once
/// inserted and are identified by their id, never by content equality.
pub struct MessageHistory {
    chat_id: String,
    messages: Vec<ChatMessage>,
    store: Box<dyn MemoryStore>,
}

impl MessageHistory {
    /// Binds a store to a conversation id and loads whatever log it already
    /// holds. A store with no prior data initializes empty; that is not an
    /// error.
    pub async fn new(
        chat_id: impl Into<String>,
        store: Box<dyn MemoryStore>,
    ) -> Result<Self, MemoryError> {
        let mut history = Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            store,
        };
        history.load_message_history().await?;
        Ok(history)
    }

    /// A history backed by process memory only.
    pub fn ephemeral(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            store: Box::new(EphemeralStore::new()),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Replaces the in-memory log with the store's copy.
    pub async fn load_message_history(&mut self) -> Result<(), MemoryError> {
        self.messages = self.store.load().await?;
        tracing::debug!(
            chat_id = %self.chat_id,
            count = self.messages.len(),
            "loaded message history"
        );
        Ok(())
    }

    pub async fn insert_message(&mut self, msg: ChatMessage) -> Result<(), MemoryError> {
        self.messages.push(msg.clone());
        self.store.append(&msg).await
    }

    /// Inserts a batch preserving order. Stores may implement this as one
    /// bulk write; the resulting log is identical to repeated single inserts.
    pub async fn insert_message_batch(&mut self, msgs: Vec<ChatMessage>) -> Result<(), MemoryError> {
        self.messages.extend(msgs.iter().cloned());
        self.store.append_batch(&msgs).await
    }

    /// Removes the message with the given id from the in-memory list and the
    /// store. Fails with [`MemoryError::MessageNotFound`] if absent.
    pub async fn remove_message(&mut self, id: Uuid) -> Result<(), MemoryError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(MemoryError::MessageNotFound { id: id.to_string() })?;
        let msg = self.messages.remove(index);
        self.store.remove(&msg).await
    }

    /// Drops every message marked temporary, in memory and in the store.
    /// Called once an auto-fix attempt sequence concludes successfully.
    pub async fn clean_temporary_messages(&mut self) -> Result<(), MemoryError> {
        let temporary: Vec<Uuid> = self
            .messages
            .iter()
            .filter(|m| m.temporary)
            .map(|m| m.id)
            .collect();
        if !temporary.is_empty() {
            tracing::debug!(
                chat_id = %self.chat_id,
                count = temporary.len(),
                "pruning temporary messages"
            );
        }
        for id in temporary {
            self.remove_message(id).await?;
        }
        Ok(())
    }

    /// Deletes the entire backend representation and clears the in-memory
    /// list. Idempotent; the explicit scope-exit for non-persistent
    /// conversations.
    pub async fn cleanup(&mut self) -> Result<(), MemoryError> {
        self.store.clear().await?;
        self.messages.clear();
        tracing::debug!(chat_id = %self.chat_id, "conversation state cleared");
        Ok(())
    }

    /// Token-bounded suffix selection.
    ///
    /// Walks the history newest-to-oldest, accumulating messages while the
    /// running token total stays within `token_limit`, and returns the kept
    /// suffix restored to chronological order. Recent turns are always
    /// favored over distant ones.
    ///
    /// If the history is non-empty but not even its most recent message fits,
    /// this fails with [`MemoryError::ContextOverflow`] rather than silently
    /// producing an empty request.
    pub fn history_upto_token_limit(
        &self,
        token_limit: usize,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Vec<ChatMessage>, MemoryError> {
        let mut kept = Vec::new();
        let mut total = 0usize;
        for msg in self.messages.iter().rev() {
            total += tokenizer.token_count(std::slice::from_ref(msg));
            if total > token_limit {
                break;
            }
            kept.push(msg.clone());
        }
        if kept.is_empty() && !self.messages.is_empty() {
            return Err(MemoryError::ContextOverflow { token_limit });
        }
        kept.reverse();
        Ok(kept)
    }
}

impl std::fmt::Display for MessageHistory {
    /// One `role: content` line per message, conversation order.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for msg in &self.messages {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{msg}")?;
            first = false;
        }
        Ok(())
    }
}
