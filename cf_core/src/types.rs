//! Core chat types shared by every chatflow crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Function => write!(f, "function"),
        }
    }
}

/// One message in a conversation.
///
/// Messages are immutable once inserted into a history: "editing" is a remove
/// followed by an insert. The `id` is assigned at creation and never reused,
/// and is the identity used for removal (content may be duplicated across
/// messages, ids may not).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub provider_id: String,
    pub role: Role,
    pub content: String,
    /// Marks a message produced during a failed auto-fix attempt, eligible
    /// for pruning once the attempt sequence concludes successfully.
    #[serde(default)]
    pub temporary: bool,
}

impl ChatMessage {
    pub fn new(provider_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.into(),
            role,
            content: content.into(),
            temporary: false,
        }
    }

    /// A message created by a failed auto-fix attempt.
    pub fn temporary(
        provider_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            temporary: true,
            ..Self::new(provider_id, role, content)
        }
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// The wire shape providers accept: an ordered list of role/content entries,
/// with an optional name field some APIs attach to function messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ChatMessage> for ProviderMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            name: None,
        }
    }
}
