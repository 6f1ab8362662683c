//! # Chatflow Core
//!
//! Shared types and traits for the chatflow system.
//!
//! This crate provides:
//! - The [`types::ChatMessage`] conversation record and its [`types::Role`]
//! - The [`traits::ChatProvider`] adapter contract
//! - The [`traits::Tokenizer`] contract used by the token-budget cutoff

pub mod traits;
pub mod types;

pub use traits::{ChatProvider, Tokenizer};
pub use types::{ChatMessage, ProviderMessage, Role};
