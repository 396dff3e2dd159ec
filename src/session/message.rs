//! Chat message model and delivery bookkeeping.

use events::ServerMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use events::Role;

/// Prefix of locally generated temporary ids.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Prefix of synthetic welcome message ids.
pub const WELCOME_ID_PREFIX: &str = "welcome-";

/// Delivery progress of a user-authored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Sent,
    Failed,
}

/// Where a message entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Confirmed by, or loaded from, the chat service.
    Server,
    /// Optimistic entry created by this client.
    Local,
    /// Synthetic greeting shown for an empty conversation. Never persisted.
    Welcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub delivery: DeliveryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub origin: MessageOrigin,
    /// Temporary id this entry was sent under. Kept after confirmation so
    /// late events that reference it still find the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ChatMessage {
    /// Optimistic user message awaiting confirmation.
    #[must_use]
    pub fn pending_user(content: impl Into<String>) -> Self {
        let id = new_local_id();
        Self {
            client_id: Some(id.clone()),
            id,
            role: Role::User,
            content: content.into(),
            timestamp: now_ms(),
            delivery: DeliveryState::Pending,
            error_detail: None,
            origin: MessageOrigin::Local,
        }
    }

    /// Terminal message built from a server payload.
    #[must_use]
    pub fn from_server(message: &ServerMessage) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            timestamp: message.created_at.unwrap_or_else(now_ms),
            delivery: DeliveryState::Sent,
            error_detail: None,
            origin: MessageOrigin::Server,
            client_id: message.client_id.clone(),
        }
    }

    /// Greeting shown when a context has no conversation yet.
    #[must_use]
    pub fn welcome(context_id: &str) -> Self {
        Self {
            id: format!("{WELCOME_ID_PREFIX}{context_id}"),
            role: Role::Assistant,
            content: format!(
                "Hi! I'm your AI tutor for \"{context_id}\". Ask me to summarize it, explain a passage, \
                 or quiz you on what you've read."
            ),
            timestamp: now_ms(),
            delivery: DeliveryState::Sent,
            error_detail: None,
            origin: MessageOrigin::Welcome,
            client_id: None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.delivery == DeliveryState::Failed
    }

    #[must_use]
    pub fn is_welcome(&self) -> bool {
        self.origin == MessageOrigin::Welcome
    }

    /// Local entry the server has not confirmed yet, whatever its delivery
    /// state. A reply may arrive before the acknowledgement.
    #[must_use]
    pub fn is_unconfirmed(&self) -> bool {
        self.origin == MessageOrigin::Local
    }

    /// Unconfirmed and not failed: an acknowledgement or send error may
    /// still arrive for it.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.is_unconfirmed() && !self.is_failed()
    }

    /// Whether `id` names this entry, by server id or by the temporary id
    /// it was sent under.
    #[must_use]
    pub fn is_named(&self, id: &str) -> bool {
        self.id == id || self.client_id.as_deref() == Some(id)
    }

    /// Reconcile this optimistic entry with the server's copy, in place.
    pub fn confirm(&mut self, server: &ServerMessage) {
        self.id = server.id.clone();
        if let Some(ts) = server.created_at {
            self.timestamp = ts;
        }
        self.mark_sent();
        self.origin = MessageOrigin::Server;
    }

    pub fn mark_sent(&mut self) {
        self.delivery = DeliveryState::Sent;
        self.error_detail = None;
    }

    pub fn mark_failed(&mut self, detail: impl Into<String>) {
        self.delivery = DeliveryState::Failed;
        self.error_detail = Some(detail.into());
    }

    pub fn mark_pending(&mut self) {
        self.delivery = DeliveryState::Pending;
        self.error_detail = None;
    }
}

/// Fresh temporary id for an optimistic message.
#[must_use]
pub fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
