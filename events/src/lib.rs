//! Wire events exchanged with the tutor chat service.
//!
//! This crate owns the JSON representation of every event on the chat socket.
//! Each text frame is an adjacently tagged object:
//!
//! ```json
//! {"event": "send_message", "data": {"content": "hi", "context_id": "ch-1", "client_id": "local-1"}}
//! ```
//!
//! Inbound events form a closed set. Frames naming an event outside that set
//! are rejected by [`decode_event`] so the session core never sees untyped
//! payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned by [`decode_event`] and [`encode_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid JSON or a payload field has the wrong shape.
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The `event` name is not part of the inbound contract.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message as stored and echoed by the chat service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Server-assigned message id.
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Correlation id supplied by the client on `send_message`, echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// For assistant replies: the `client_id` of the user message answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Per-user quota reported alongside history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_limit: Option<u32>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<i64>,
}

/// Events sent from the client to the chat service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage {
        content: String,
        context_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        client_id: String,
    },
    RequestHistory {
        context_id: String,
        limit: u32,
        offset: u32,
    },
}

/// Events sent from the chat service to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake acknowledgment.
    Connected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    UserMessageAck {
        message: ServerMessage,
    },
    AssistantMessage {
        message: ServerMessage,
    },
    Typing {
        active: bool,
    },
    SendError {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    History {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
        #[serde(default)]
        messages: Vec<ServerMessage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_limits: Option<UsageLimits>,
    },
    HistoryError {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
    },
}

impl ServerEvent {
    /// Every inbound event name accepted by [`decode_event`].
    pub const NAMES: [&'static str; 7] = [
        "connected",
        "user_message_ack",
        "assistant_message",
        "typing",
        "send_error",
        "history",
        "history_error",
    ];

    /// Wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::UserMessageAck { .. } => "user_message_ack",
            Self::AssistantMessage { .. } => "assistant_message",
            Self::Typing { .. } => "typing",
            Self::SendError { .. } => "send_error",
            Self::History { .. } => "history",
            Self::HistoryError { .. } => "history_error",
        }
    }
}

impl ClientEvent {
    /// Wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::RequestHistory { .. } => "request_history",
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Encode any wire event as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_event<E: Serialize>(event: &E) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a JSON text frame into a typed inbound event.
///
/// A missing or `null` `data` field is treated as an empty object so
/// payload-less events such as `connected` decode.
///
/// # Errors
///
/// Returns [`CodecError::UnknownEvent`] for event names outside
/// [`ServerEvent::NAMES`] and [`CodecError::Json`] for malformed frames or
/// payloads.
pub fn decode_event(text: &str) -> Result<ServerEvent, CodecError> {
    let raw: RawEvent = serde_json::from_str(text)?;
    if !ServerEvent::NAMES.contains(&raw.event.as_str()) {
        return Err(CodecError::UnknownEvent(raw.event));
    }

    let data = match raw.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let mut tagged = Map::new();
    tagged.insert("event".to_owned(), Value::String(raw.event));
    tagged.insert("data".to_owned(), data);

    Ok(serde_json::from_value(Value::Object(tagged))?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
