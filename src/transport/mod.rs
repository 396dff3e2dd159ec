//! Seam between the session core and the network.
//!
//! DESIGN
//! ======
//! The session never awaits the network. It issues commands through the
//! [`Transport`] trait, which return immediately, and learns the outcome from
//! [`TransportEvent`]s delivered later by whoever drives the session.
//!
//! Every event is wrapped in an [`InboundEvent`] carrying the connection
//! epoch it belongs to. The session bumps its epoch on each connect and
//! teardown, so events from a superseded connection compare unequal and are
//! dropped.

pub mod backoff;
pub mod ws;

use events::{ClientEvent, ServerEvent};

pub use ws::WsTransport;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no live connection to the chat service")]
    NotConnected,
    #[error("failed to encode {event}: {message}")]
    Encode { event: &'static str, message: String },
}

/// Outbound half of the transport contract.
pub trait Transport {
    /// Open a connection authenticated with `token`. Outcome is reported as
    /// events tagged with `epoch`.
    fn connect(&mut self, epoch: u64, token: &str);

    /// Close the connection and stop any automatic reconnection.
    fn disconnect(&mut self);

    /// Queue an event for delivery on the live connection.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when there is no connection to queue on.
    fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError>;
}

/// Inbound lifecycle and protocol events.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// A (re)connection attempt started. `attempt` is 0 for the initial
    /// connect and counts up for automatic retries.
    Connecting { attempt: u32 },
    /// Handshake accepted.
    Connected,
    /// The connection could not be established.
    ConnectError { reason: String, auth_rejected: bool },
    /// An established connection dropped without the caller asking.
    Disconnected { reason: String },
    /// Automatic reconnection gave up.
    ReconnectExhausted { attempts: u32 },
    /// A decoded protocol event.
    Server(ServerEvent),
}

/// A [`TransportEvent`] tagged with the epoch of the connection it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    pub epoch: u64,
    pub event: TransportEvent,
}

impl InboundEvent {
    #[must_use]
    pub fn new(epoch: u64, event: TransportEvent) -> Self {
        Self { epoch, event }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
