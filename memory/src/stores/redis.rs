//! Redis list store: one list per conversation, one element per message.

use async_trait::async_trait;
use cf_core::types::ChatMessage;
use errors::MemoryError;
use redis::AsyncCommands;

use super::MemoryStore;

fn redis_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: "redis".to_string(),
        reason: err.to_string(),
    }
}

/// Message log stored as a Redis list keyed by the conversation id.
///
/// Messages are `LPUSH`ed, so the list holds newest-first and retrieval
/// reverses it back to conversation order. Removal uses `LREM` on the
/// serialized message, which is stable because messages are immutable after
/// insertion.
pub struct RedisStore {
    chat_id: String,
    connection_manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn new(
        connection_string: &str,
        chat_id: impl Into<String>,
    ) -> Result<Self, MemoryError> {
        let client = redis::Client::open(connection_string).map_err(redis_error)?;
        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(redis_error)?;
        Ok(Self {
            chat_id: chat_id.into(),
            connection_manager,
        })
    }

    fn encode(msg: &ChatMessage) -> Result<String, MemoryError> {
        Ok(serde_json::to_string(msg)?)
    }
}

#[async_trait]
impl MemoryStore for RedisStore {
    async fn load(&self) -> Result<Vec<ChatMessage>, MemoryError> {
        let mut conn = self.connection_manager.clone();
        let raw: Vec<String> = conn
            .lrange(&self.chat_id, 0, -1)
            .await
            .map_err(redis_error)?;
        // Redis returns the most recent push first.
        let mut messages = raw
            .iter()
            .map(|item| serde_json::from_str(item).map_err(MemoryError::from))
            .collect::<Result<Vec<ChatMessage>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn append(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        let mut conn = self.connection_manager.clone();
        conn.lpush::<_, _, ()>(&self.chat_id, Self::encode(msg)?)
            .await
            .map_err(redis_error)
    }

    async fn append_batch(&self, msgs: &[ChatMessage]) -> Result<(), MemoryError> {
        if msgs.is_empty() {
            return Ok(());
        }
        // A single LPUSH of the whole batch: values are pushed left to
        // right, leaving the last (newest) message at the head.
        let encoded = msgs
            .iter()
            .map(Self::encode)
            .collect::<Result<Vec<String>, _>>()?;
        let mut conn = self.connection_manager.clone();
        conn.lpush::<_, _, ()>(&self.chat_id, encoded)
            .await
            .map_err(redis_error)
    }

    async fn remove(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        let mut conn = self.connection_manager.clone();
        conn.lrem::<_, _, ()>(&self.chat_id, 1, Self::encode(msg)?)
            .await
            .map_err(redis_error)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut conn = self.connection_manager.clone();
        conn.del::<_, ()>(&self.chat_id).await.map_err(redis_error)
    }
}
