//! Persistence primitives behind [`crate::MessageHistory`].
//!
//! Each store implements the same narrow contract regardless of the
//! underlying medium (file path, bucket + key, Redis list, SQL table).
//! "Not found" on load is the initialization path, never an error; every
//! other backend failure propagates uncaught — there is no retry at this
//! layer.

pub mod document;
pub mod ephemeral;
pub mod local_file;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "gcs")]
pub mod gcs;

#[cfg(feature = "azure-blob")]
pub mod azure_blob;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "postgres")]
pub mod sql;

pub use document::{BlobStore, DocumentStore, MemoryDocument};
pub use ephemeral::EphemeralStore;
pub use local_file::{LocalFileBlob, LocalFileStore};

#[cfg(feature = "s3")]
pub use s3::{S3Blob, S3Store};

#[cfg(feature = "gcs")]
pub use gcs::{GcsBlob, GcsStore};

#[cfg(feature = "azure-blob")]
pub use azure_blob::{AzureBlob, AzureBlobStore};

#[cfg(feature = "redis")]
pub use redis::RedisStore;

#[cfg(feature = "postgres")]
pub use sql::SqlStore;

use async_trait::async_trait;
use cf_core::types::ChatMessage;
use errors::MemoryError;

/// Uniform persistence contract for one conversation's message log.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Returns the stored log in conversation order. A store with no prior
    /// data for this conversation initializes its representation and returns
    /// an empty log.
    async fn load(&self) -> Result<Vec<ChatMessage>, MemoryError>;

    /// Appends one message to the stored log.
    async fn append(&self, msg: &ChatMessage) -> Result<(), MemoryError>;

    /// Appends a batch preserving order. Stores with a cheaper bulk path
    /// override this.
    async fn append_batch(&self, msgs: &[ChatMessage]) -> Result<(), MemoryError> {
        for msg in msgs {
            self.append(msg).await?;
        }
        Ok(())
    }

    /// Removes the stored copy of the given message, matched by id.
    async fn remove(&self, msg: &ChatMessage) -> Result<(), MemoryError>;

    /// Deletes the entire representation for this conversation. Idempotent:
    /// clearing an already-absent log succeeds.
    async fn clear(&self) -> Result<(), MemoryError>;
}
