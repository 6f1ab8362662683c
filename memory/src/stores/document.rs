//! Shared read-modify-write layer for the file-like stores.
//!
//! Local file, S3, GCS and Azure Blob all persist the same JSON document and
//! differ only in how the blob is read, written and removed. Each mutation is
//! a full read-modify-write: last writer wins, so concurrent writers on the
//! same conversation id are not safe (single-session use is the target).

use async_trait::async_trait;
use cf_core::types::ChatMessage;
use chrono::Utc;
use errors::MemoryError;
use serde::{Deserialize, Serialize};

use super::MemoryStore;

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// The persisted document shape for file-like stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub chat_id: String,
    pub messages: Vec<ChatMessage>,
    /// Epoch seconds.
    pub created_at: f64,
    /// Epoch seconds, refreshed on every write.
    pub updated_at: f64,
}

impl MemoryDocument {
    pub fn new(chat_id: impl Into<String>) -> Self {
        let now = epoch_seconds();
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Blob primitives a file-like medium must provide.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads the whole blob; `None` when it does not exist yet.
    async fn read(&self) -> Result<Option<String>, MemoryError>;

    /// Writes the whole blob, creating it if necessary.
    async fn write(&self, content: &str) -> Result<(), MemoryError>;

    /// Removes the blob. Removing an already-absent blob succeeds.
    async fn remove(&self) -> Result<(), MemoryError>;
}

/// A [`MemoryStore`] over any [`BlobStore`], persisting one
/// [`MemoryDocument`] per conversation.
pub struct DocumentStore<B: BlobStore> {
    chat_id: String,
    blob: B,
}

impl<B: BlobStore> DocumentStore<B> {
    pub fn new(chat_id: impl Into<String>, blob: B) -> Self {
        Self {
            chat_id: chat_id.into(),
            blob,
        }
    }

    async fn read_document(&self) -> Result<Option<MemoryDocument>, MemoryError> {
        match self.blob.read().await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    /// Reads the current document, initializing a fresh one if the blob does
    /// not exist yet.
    async fn read_or_init(&self) -> Result<MemoryDocument, MemoryError> {
        match self.read_document().await? {
            Some(doc) => Ok(doc),
            None => Ok(MemoryDocument::new(&self.chat_id)),
        }
    }

    async fn write_document(&self, mut doc: MemoryDocument) -> Result<(), MemoryError> {
        doc.updated_at = epoch_seconds();
        self.blob.write(&serde_json::to_string(&doc)?).await
    }
}

#[async_trait]
impl<B: BlobStore> MemoryStore for DocumentStore<B> {
    async fn load(&self) -> Result<Vec<ChatMessage>, MemoryError> {
        match self.read_document().await? {
            Some(doc) => Ok(doc.messages),
            None => {
                // First contact with this conversation: initialize the blob.
                tracing::debug!(chat_id = %self.chat_id, "initializing memory document");
                self.write_document(MemoryDocument::new(&self.chat_id))
                    .await?;
                Ok(Vec::new())
            }
        }
    }

    async fn append(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        let mut doc = self.read_or_init().await?;
        doc.messages.push(msg.clone());
        self.write_document(doc).await
    }

    async fn append_batch(&self, msgs: &[ChatMessage]) -> Result<(), MemoryError> {
        // One round trip instead of one per message.
        let mut doc = self.read_or_init().await?;
        doc.messages.extend(msgs.iter().cloned());
        self.write_document(doc).await
    }

    async fn remove(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        let mut doc = self.read_or_init().await?;
        let index = doc
            .messages
            .iter()
            .position(|m| m.id == msg.id)
            .ok_or(MemoryError::MessageNotFound {
                id: msg.id.to_string(),
            })?;
        doc.messages.remove(index);
        self.write_document(doc).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.blob.remove().await
    }
}
