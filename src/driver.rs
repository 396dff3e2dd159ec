//! Async driver that owns a [`ChatSession`] on a tokio task.
//!
//! ARCHITECTURE
//! ============
//! One task owns the session. Caller commands, transport events and
//! identity changes all arrive on channels and are applied one at a time in
//! a `select!` loop, so no two mutations ever interleave. After each one the
//! task publishes a fresh [`ChatSnapshot`] on a `watch` channel.
//!
//! ```text
//! SessionHandle ──Command──► ┌──────────────┐ ──snapshot──► watch::Receiver
//! identity watch ──────────► │ run_session  │
//! WsTransport ──InboundEvent►└──────────────┘ ──connect/emit──► WsTransport
//! ```
//!
//! Commands are fire-and-forget. Validation failures surface in the next
//! snapshot (`last_error`), exactly as they do for direct session callers.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::Identity;
use crate::session::ChatSession;
use crate::session::snapshot::ChatSnapshot;
use crate::transport::{InboundEvent, Transport, WsTransport};

/// Caller request forwarded to the driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { token: String, context_id: String },
    SwitchContext { context_id: String },
    Send { content: String },
    Retry { message_id: String },
    Stop,
    DismissNotice,
    Shutdown,
}

/// Handle to a running session task.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ChatSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn start(&self, token: impl Into<String>, context_id: impl Into<String>) -> Result<(), SessionError> {
        self.command(Command::Start { token: token.into(), context_id: context_id.into() })
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn switch_context(&self, context_id: impl Into<String>) -> Result<(), SessionError> {
        self.command(Command::SwitchContext { context_id: context_id.into() })
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn send(&self, content: impl Into<String>) -> Result<(), SessionError> {
        self.command(Command::Send { content: content.into() })
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn retry(&self, message_id: impl Into<String>) -> Result<(), SessionError> {
        self.command(Command::Retry { message_id: message_id.into() })
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.command(Command::Stop)
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the session task has exited.
    pub fn dismiss_notice(&self) -> Result<(), SessionError> {
        self.command(Command::DismissNotice)
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the session and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            debug!(error = %e, "driver: session task ended abnormally");
        }
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

// =============================================================================
// SPAWN
// =============================================================================

/// Spawn a session backed by a [`WsTransport`].
///
/// `identity` is the identity provider's channel; sign-out stops the session
/// and a new token reconnects it. Must be called within a tokio runtime.
#[must_use]
pub fn spawn_session(config: SessionConfig, identity: watch::Receiver<Option<Identity>>) -> SessionHandle {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let transport = WsTransport::new(config.clone(), inbound_tx);
    spawn_with(ChatSession::new(config, transport), inbound_rx, identity)
}

/// Spawn a driver task for an already-built session and its event source.
#[must_use]
pub fn spawn_with<T>(
    session: ChatSession<T>,
    inbound: mpsc::UnboundedReceiver<InboundEvent>,
    identity: watch::Receiver<Option<Identity>>,
) -> SessionHandle
where
    T: Transport + Send + 'static,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let task = tokio::spawn(run_session(session, commands_rx, inbound, identity, snapshot_tx));
    SessionHandle { commands: commands_tx, snapshots: snapshot_rx, task }
}

// =============================================================================
// LOOP
// =============================================================================

/// Apply commands, transport events and identity changes until shutdown.
///
/// The loop ends on [`Command::Shutdown`] or when every command sender is
/// dropped; the session is stopped on the way out.
pub async fn run_session<T: Transport>(
    mut session: ChatSession<T>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    mut identity: watch::Receiver<Option<Identity>>,
    snapshots: watch::Sender<ChatSnapshot>,
) {
    let initial = identity.borrow_and_update().clone();
    if let Some(initial) = initial {
        apply_identity(&mut session, Some(&initial));
        snapshots.send_replace(session.snapshot());
    }
    let mut identity_open = true;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => apply_command(&mut session, command),
            },
            Some(event) = inbound.recv() => session.handle_event(event),
            changed = identity.changed(), if identity_open => match changed {
                Ok(()) => {
                    let current = identity.borrow_and_update().clone();
                    apply_identity(&mut session, current.as_ref());
                }
                Err(_) => {
                    debug!("driver: identity provider closed");
                    identity_open = false;
                }
            },
        }
        snapshots.send_replace(session.snapshot());
    }

    session.stop();
    snapshots.send_replace(session.snapshot());
    info!("driver: session task exiting");
}

fn apply_command<T: Transport>(session: &mut ChatSession<T>, command: Command) {
    let result = match command {
        Command::Start { token, context_id } => session.start(&token, &context_id),
        Command::SwitchContext { context_id } => {
            session.switch_context(&context_id);
            Ok(())
        }
        Command::Send { content } => session.send(&content).map(|_| ()),
        Command::Retry { message_id } => session.retry(&message_id),
        Command::Stop => {
            session.stop();
            Ok(())
        }
        Command::DismissNotice => {
            session.dismiss_notice();
            Ok(())
        }
        Command::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        debug!(error = %e, "driver: command rejected");
    }
}

fn apply_identity<T: Transport>(session: &mut ChatSession<T>, identity: Option<&Identity>) {
    if let Err(e) = session.apply_identity(identity) {
        debug!(error = %e, "driver: identity change rejected");
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
