//! Google Cloud Storage blob medium.
//!
//! Talks to the GCS JSON API directly with a bearer token from the ambient
//! credential chain (`gcp_auth`).

use async_trait::async_trait;
use errors::MemoryError;
use std::sync::Arc;

use super::document::{BlobStore, DocumentStore};

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

fn gcs_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: "gcs".to_string(),
        reason: err.to_string(),
    }
}

enum TokenSource {
    Provider(Arc<dyn gcp_auth::TokenProvider>),
    Static(String),
}

/// One JSON object per conversation in a GCS bucket.
pub struct GcsBlob {
    http: reqwest::Client,
    tokens: TokenSource,
    base_url: String,
    bucket: String,
    object: String,
}

impl GcsBlob {
    /// Resolves credentials from the ambient chain (metadata server, service
    /// account file, gcloud config). An explicit `GOOGLE_ACCESS_TOKEN` wins
    /// over the chain, for environments without metadata-server access.
    pub async fn from_env(
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Result<Self, MemoryError> {
        if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            return Ok(Self::with_static_token(bucket, object, token));
        }
        let token_provider = gcp_auth::provider().await.map_err(gcs_error)?;
        Ok(Self {
            http: reqwest::Client::new(),
            tokens: TokenSource::Provider(token_provider),
            base_url: DEFAULT_BASE_URL.to_string(),
            bucket: bucket.into(),
            object: object.into(),
        })
    }

    /// A blob authenticated with a fixed bearer token, skipping the
    /// credential chain entirely.
    pub fn with_static_token(
        bucket: impl Into<String>,
        object: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: TokenSource::Static(token.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Overrides the public endpoint, for emulators and tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn default_object(chat_id: &str) -> String {
        format!("chatflow/{chat_id}/memory.json")
    }

    async fn bearer(&self) -> Result<String, MemoryError> {
        match &self.tokens {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Provider(provider) => {
                let token = provider.token(&[STORAGE_SCOPE]).await.map_err(gcs_error)?;
                Ok(token.as_str().to_string())
            }
        }
    }

    fn object_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(&self.object)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(&self.object)
        )
    }
}

#[async_trait]
impl BlobStore for GcsBlob {
    async fn read(&self) -> Result<Option<String>, MemoryError> {
        let response = self
            .http
            .get(format!("{}?alt=media", self.object_url()))
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(gcs_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(gcs_error(format!(
                "GET {} returned {}",
                self.object,
                response.status()
            )));
        }
        response.text().await.map(Some).map_err(gcs_error)
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(self.bearer().await?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_string())
            .send()
            .await
            .map_err(gcs_error)?;
        if !response.status().is_success() {
            return Err(gcs_error(format!(
                "upload of {} returned {}",
                self.object,
                response.status()
            )));
        }
        Ok(())
    }

    async fn remove(&self) -> Result<(), MemoryError> {
        let response = self
            .http
            .delete(self.object_url())
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(gcs_error)?;
        // Already gone counts as removed.
        if response.status() == reqwest::StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(gcs_error(format!(
            "DELETE {} returned {}",
            self.object,
            response.status()
        )))
    }
}

/// Message log stored as a JSON object in GCS.
pub type GcsStore = DocumentStore<GcsBlob>;

impl GcsStore {
    pub async fn from_env(
        chat_id: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, MemoryError> {
        let chat_id = chat_id.into();
        let blob = GcsBlob::from_env(bucket, GcsBlob::default_object(&chat_id)).await?;
        Ok(DocumentStore::new(chat_id, blob))
    }
}
