//! Postgres store: one row per message keyed by (chat_id, message id).

use async_trait::async_trait;
use cf_core::types::ChatMessage;
use errors::MemoryError;
use sqlx::{Pool, Postgres, Row};

use super::MemoryStore;

fn sql_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: "postgres".to_string(),
        reason: err.to_string(),
    }
}

/// Message log stored one row per message in a Postgres table.
///
/// A `seq` column records insertion order; the original log order is
/// reconstructed by `ORDER BY seq` regardless of physical row order.
pub struct SqlStore {
    chat_id: String,
    pool: Pool<Postgres>,
    table: String,
}

impl SqlStore {
    /// Connects and creates the table if it does not exist.
    pub async fn new(
        connection_url: &str,
        chat_id: impl Into<String>,
        table: Option<String>,
    ) -> Result<Self, MemoryError> {
        let pool = Pool::connect(connection_url).await.map_err(sql_error)?;
        let store = Self {
            chat_id: chat_id.into(),
            pool,
            table: table.unwrap_or_else(|| "message_history".to_string()),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), MemoryError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL,
                chat_id TEXT NOT NULL,
                id TEXT NOT NULL,
                message JSONB NOT NULL,
                PRIMARY KEY (chat_id, id)
            )",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_chat_id ON {0}(chat_id)",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;

        Ok(())
    }
}

#[async_trait]
impl MemoryStore for SqlStore {
    async fn load(&self) -> Result<Vec<ChatMessage>, MemoryError> {
        let rows = sqlx::query(&format!(
            "SELECT message FROM {} WHERE chat_id = $1 ORDER BY seq",
            self.table
        ))
        .bind(&self.chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("message").map_err(sql_error)?;
                serde_json::from_value(value).map_err(MemoryError::from)
            })
            .collect()
    }

    async fn append(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (chat_id, id, message) VALUES ($1, $2, $3)",
            self.table
        ))
        .bind(&self.chat_id)
        .bind(msg.id.to_string())
        .bind(serde_json::to_value(msg)?)
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;
        Ok(())
    }

    async fn remove(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE chat_id = $1 AND id = $2",
            self.table
        ))
        .bind(&self.chat_id)
        .bind(msg.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        sqlx::query(&format!("DELETE FROM {} WHERE chat_id = $1", self.table))
            .bind(&self.chat_id)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(())
    }
}
