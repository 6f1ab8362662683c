//! AWS S3 blob medium.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use errors::MemoryError;

use super::document::{BlobStore, DocumentStore};

fn s3_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: "s3".to_string(),
        reason: err.to_string(),
    }
}

/// One JSON object per conversation in an S3 bucket.
pub struct S3Blob {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
}

impl S3Blob {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Builds a client from the ambient credential chain.
    pub async fn from_env(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, key)
    }

    pub fn default_key(chat_id: &str) -> String {
        format!("chatflow/{chat_id}/memory.json")
    }
}

#[async_trait]
impl BlobStore for S3Blob {
    async fn read(&self) -> Result<Option<String>, MemoryError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;
        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(s3_error)?
                    .into_bytes();
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(s3_error)
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(s3_error(service_err))
                }
            }
        }
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(content.as_bytes().to_vec()))
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), MemoryError> {
        // S3 deletes are idempotent: deleting a missing key succeeds.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }
}

/// Message log stored as a JSON object in S3.
pub type S3Store = DocumentStore<S3Blob>;

impl S3Store {
    /// A store using the ambient credential chain and the default
    /// `chatflow/<chat_id>/memory.json` object key.
    pub async fn from_env(chat_id: impl Into<String>, bucket: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        let blob = S3Blob::from_env(bucket, S3Blob::default_key(&chat_id)).await;
        DocumentStore::new(chat_id, blob)
    }
}
