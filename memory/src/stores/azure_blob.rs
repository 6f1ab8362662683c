//! Azure Blob Storage medium.
//!
//! Talks to the Blob service REST API with a SAS token; no account key ever
//! leaves the caller's configuration.

use async_trait::async_trait;
use errors::MemoryError;

use super::document::{BlobStore, DocumentStore};

fn azure_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: "azure-blob".to_string(),
        reason: err.to_string(),
    }
}

/// One JSON blob per conversation in an Azure Blob container.
pub struct AzureBlob {
    http: reqwest::Client,
    endpoint: String,
    container: String,
    blob_name: String,
    sas_token: String,
}

impl AzureBlob {
    pub fn new(
        account: impl Into<String>,
        container: impl Into<String>,
        blob_name: impl Into<String>,
        sas_token: impl Into<String>,
    ) -> Self {
        let account: String = account.into();
        let sas = sas_token.into();
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("https://{account}.blob.core.windows.net"),
            container: container.into(),
            blob_name: blob_name.into(),
            sas_token: sas.trim_start_matches('?').to_string(),
        }
    }

    /// Overrides the account endpoint, for Azurite and tests.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn default_blob_name(chat_id: &str) -> String {
        format!("chatflow/{chat_id}/memory.json")
    }

    // Blob names keep their literal `/` separators; the Blob service treats
    // them as a virtual directory path.
    fn blob_url(&self) -> String {
        format!(
            "{}/{}/{}?{}",
            self.endpoint, self.container, self.blob_name, self.sas_token
        )
    }
}

#[async_trait]
impl BlobStore for AzureBlob {
    async fn read(&self) -> Result<Option<String>, MemoryError> {
        let response = self
            .http
            .get(self.blob_url())
            .send()
            .await
            .map_err(azure_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(azure_error(format!(
                "GET {} returned {}",
                self.blob_name,
                response.status()
            )));
        }
        response.text().await.map(Some).map_err(azure_error)
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        let response = self
            .http
            .put(self.blob_url())
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_string())
            .send()
            .await
            .map_err(azure_error)?;
        if !response.status().is_success() {
            return Err(azure_error(format!(
                "PUT {} returned {}",
                self.blob_name,
                response.status()
            )));
        }
        Ok(())
    }

    async fn remove(&self) -> Result<(), MemoryError> {
        let response = self
            .http
            .delete(self.blob_url())
            .send()
            .await
            .map_err(azure_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(azure_error(format!(
            "DELETE {} returned {}",
            self.blob_name,
            response.status()
        )))
    }
}

/// Message log stored as a blob in Azure Blob Storage.
pub type AzureBlobStore = DocumentStore<AzureBlob>;

impl AzureBlobStore {
    pub fn with_sas(
        chat_id: impl Into<String>,
        account: impl Into<String>,
        container: impl Into<String>,
        sas_token: impl Into<String>,
    ) -> Self {
        let chat_id = chat_id.into();
        let blob = AzureBlob::new(
            account,
            container,
            AzureBlob::default_blob_name(&chat_id),
            sas_token,
        );
        DocumentStore::new(chat_id, blob)
    }
}
