//! Errors returned by session operations.
//!
//! Every variant is also mirrored into observable state (connection error or
//! a [`Notice`](crate::session::snapshot::Notice)) before it is returned, so
//! callers that only render snapshots lose nothing by ignoring the result.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyContent,
    #[error("no chapter selected")]
    NoContext,
    #[error("not connected to the tutor")]
    NotConnected,
    #[error("no message with id {0}")]
    UnknownMessage(String),
    #[error("message {0} has not failed and cannot be retried")]
    NotRetryable(String),
    #[error("missing access token; sign in to chat with the tutor")]
    MissingToken,
    #[error("access token contains characters that cannot be sent; sign in again")]
    InvalidToken,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("chat session has shut down")]
    Closed,
}
