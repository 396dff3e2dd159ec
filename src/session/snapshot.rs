//! Read-only view of a session for the presentation layer.

pub use events::UsageLimits;
use serde::Serialize;

use super::connection::ConnectionState;
use super::message::ChatMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// A caller request was rejected locally.
    Validation,
    /// Conversation history could not be loaded.
    History,
}

/// Dismissible, user-facing error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Active conversation scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversationContext {
    pub context_id: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChatSnapshot {
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionState,
    pub context: ConversationContext,
    /// The service reports the tutor is composing a reply.
    pub is_typing: bool,
    /// A send is outstanding and no reply has arrived yet.
    pub awaiting_reply: bool,
    pub last_error: Option<Notice>,
    pub usage_limits: Option<UsageLimits>,
}

impl ChatSnapshot {
    /// Messages suitable for export: everything except the synthetic welcome.
    #[must_use]
    pub fn transcript(&self) -> Vec<&ChatMessage> {
        self.messages.iter().filter(|m| !m.is_welcome()).collect()
    }

    #[must_use]
    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether the UI should show a busy indicator.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.is_typing || self.awaiting_reply
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
