//! Connection state mirrored from the transport.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Observable connection state.
///
/// `error` is only set while `status` is [`ConnectionStatus::Error`], or
/// while reconnecting after a drop so the UI can keep explaining why.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub error: Option<String>,
    /// Automatic recovery is over; the UI should offer a manual retry.
    pub retry_available: bool,
    /// Automatic reconnection attempt in progress, 0 for the first connect.
    pub attempt: u32,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Connected, or on the way there.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.status, ConnectionStatus::Connected | ConnectionStatus::Connecting)
    }

    pub(crate) fn connecting(&mut self, attempt: u32) {
        self.status = ConnectionStatus::Connecting;
        self.attempt = attempt;
        self.retry_available = false;
        if attempt == 0 {
            self.error = None;
        }
    }

    pub(crate) fn connected(&mut self) {
        *self = Self { status: ConnectionStatus::Connected, ..Self::default() };
    }

    /// Failure the transport may still recover from on its own.
    pub(crate) fn failed(&mut self, message: impl Into<String>) {
        self.status = ConnectionStatus::Error;
        self.error = Some(message.into());
        self.retry_available = false;
    }

    /// Failure that needs the caller to act.
    pub(crate) fn failed_terminal(&mut self, message: impl Into<String>) {
        self.failed(message);
        self.retry_available = true;
    }

    pub(crate) fn disconnected(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
