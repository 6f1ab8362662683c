//! Process-memory store with no durability.

use async_trait::async_trait;
use cf_core::types::ChatMessage;
use errors::MemoryError;
use std::sync::Mutex;

use super::MemoryStore;

/// Keeps the log in process memory only. Useful for tests and for
/// conversations that should not outlive the process.
#[derive(Default)]
pub struct EphemeralStore {
    messages: Mutex<Vec<ChatMessage>>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for EphemeralStore {
    async fn load(&self) -> Result<Vec<ChatMessage>, MemoryError> {
        Ok(self.messages.lock().expect("ephemeral store poisoned").clone())
    }

    async fn append(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        self.messages
            .lock()
            .expect("ephemeral store poisoned")
            .push(msg.clone());
        Ok(())
    }

    async fn remove(&self, msg: &ChatMessage) -> Result<(), MemoryError> {
        let mut messages = self.messages.lock().expect("ephemeral store poisoned");
        if let Some(index) = messages.iter().position(|m| m.id == msg.id) {
            messages.remove(index);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.messages
            .lock()
            .expect("ephemeral store poisoned")
            .clear();
        Ok(())
    }
}
