//! Conversation memory for the chatflow system.
//!
//! This crate provides a unified interface over multiple persistence backends
//! for an ordered, append-only message log keyed by a conversation id.
//!
//! # Supported stores
//!
//! | Store | Feature | Persistence |
//! |-------|---------|-------------|
//! | Ephemeral | always | process memory only |
//! | Local file | always | JSON document on disk |
//! | S3 | `s3` | JSON document per chat id |
//! | GCS | `gcs` | JSON document per chat id |
//! | Azure Blob | `azure-blob` | JSON document per chat id |
//! | Redis | `redis` | one list element per message |
//! | Postgres | `postgres` | one row per message |
//!
//! [`MessageHistory`] owns the authoritative in-memory log and mirrors every
//! mutation to its [`MemoryStore`]. Conversations are single-writer: the
//! file-like stores are read-modify-write with last-writer-wins semantics and
//! provide no optimistic concurrency.

pub mod factory;
pub mod history;
pub mod stores;

pub use factory::{MemoryConfig, MemoryStoreType, create_store};
pub use history::MessageHistory;
pub use stores::{EphemeralStore, MemoryStore};
