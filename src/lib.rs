//! Client-side chat session for an AI reading tutor.
//!
//! A learner holds one conversation per chapter or material (the "context").
//! This crate keeps that conversation's state consistent while the network
//! misbehaves: optimistic sends are reconciled with server confirmations,
//! history responses for a context the user already left are discarded, and
//! dropped connections recover with bounded backoff.
//!
//! ARCHITECTURE
//! ============
//! - [`session::ChatSession`]: synchronous state machine, generic over
//!   [`transport::Transport`]. All policy lives here.
//! - [`transport::WsTransport`]: WebSocket implementation of the transport,
//!   speaking the JSON protocol defined in the `events` crate.
//! - [`driver`]: tokio task that owns a session and publishes
//!   [`session::snapshot::ChatSnapshot`]s on a `watch` channel.
//! - [`config::SessionConfig`]: service URL and tuning, from the environment.

pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod session;
pub mod transport;

pub use config::{ConfigError, SessionConfig};
pub use driver::{SessionHandle, spawn_session};
pub use error::SessionError;
pub use identity::Identity;
pub use session::ChatSession;
pub use session::snapshot::ChatSnapshot;
