//! Local-file blob medium.

use async_trait::async_trait;
use errors::MemoryError;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::document::{BlobStore, DocumentStore};

/// One JSON file per conversation on the local filesystem.
pub struct LocalFileBlob {
    path: PathBuf,
}

impl LocalFileBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default on-disk location for a conversation id, computed once at
    /// construction.
    pub fn default_path(chat_id: &str) -> PathBuf {
        Path::new(".")
            .join(".chatflow")
            .join(chat_id)
            .join("memory.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlobStore for LocalFileBlob {
    async fn read(&self) -> Result<Option<String>, MemoryError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, content: &str) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), MemoryError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Message log stored in a local JSON file.
pub type LocalFileStore = DocumentStore<LocalFileBlob>;

impl LocalFileStore {
    /// A store at the given path, or the default
    /// `./.chatflow/<chat_id>/memory.json` location.
    pub fn at(chat_id: impl Into<String>, path: Option<PathBuf>) -> Self {
        let chat_id = chat_id.into();
        let path = path.unwrap_or_else(|| LocalFileBlob::default_path(&chat_id));
        DocumentStore::new(chat_id, LocalFileBlob::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use cf_core::types::{ChatMessage, Role};

    #[tokio::test]
    async fn round_trips_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let m1 = ChatMessage::new("p", Role::User, "hello");
        let m2 = ChatMessage::new("p", Role::Assistant, "hi there");
        {
            let store = LocalFileStore::at("chat-1", Some(path.clone()));
            store.append(&m1).await.unwrap();
            store.append(&m2).await.unwrap();
        }

        // A fresh instance sees the same log, order and content preserved.
        let store = LocalFileStore::at("chat-1", Some(path));
        assert_eq!(store.load().await.unwrap(), vec![m1, m2]);
    }

    #[tokio::test]
    async fn load_creates_the_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("memory.json");

        let store = LocalFileStore::at("chat-1", Some(path.clone()));
        assert!(store.load().await.unwrap().is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn clear_removes_the_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let store = LocalFileStore::at("chat-1", Some(path.clone()));
        store
            .append(&ChatMessage::new("p", Role::User, "hello"))
            .await
            .unwrap();
        assert!(path.exists());

        store.clear().await.unwrap();
        assert!(!path.exists());
        store.clear().await.unwrap();
    }
}
