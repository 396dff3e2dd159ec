//! Chat session state machine.
//!
//! ARCHITECTURE
//! ============
//! `ChatSession` owns every piece of user-visible chat state for one user and
//! one active context (chapter/material). It never awaits anything: caller
//! operations (`start`, `switch_context`, `send`, `retry`, `stop`) issue
//! commands through a [`Transport`] and return immediately, and network
//! outcomes arrive later through [`ChatSession::handle_event`]. Whoever owns
//! the session must apply both serially; see [`crate::driver`].
//!
//! DESIGN
//! ======
//! - Staleness is an equality check against named fields. `epoch` is bumped
//!   on every connect and teardown, so events from a superseded connection
//!   are dropped. History responses are matched to the context that asked
//!   for them and dropped unless that context is still active.
//! - Optimistic sends are keyed by a client-generated id, sent as
//!   `client_id` and echoed back by the service. When no echo is present the
//!   oldest in-flight message (same content first) is assumed. Replies never
//!   change a user message's delivery state unless `reply_to` names it.
//! - Replies and acks are scoped to the active context. Conversation ids of
//!   contexts the user left are retired, a `reply_to` that names nothing in
//!   the current list is dropped, and an uncorrelated reply is only accepted
//!   while a send in this context is still waiting for one.
//! - Failures never escape as panics. Connection problems land in
//!   `connection`, history problems in `last_error`, send problems on the
//!   message itself.

pub mod connection;
mod history;
pub mod message;
pub mod snapshot;

use events::{ClientEvent, ServerEvent, ServerMessage, UsageLimits};
use tracing::{debug, info, warn};

use self::connection::ConnectionState;
use self::history::{HistoryRequests, merge_history};
use self::message::ChatMessage;
use self::snapshot::{ChatSnapshot, ConversationContext, Notice, NoticeKind};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::{Identity, is_valid_token};
use crate::transport::{InboundEvent, Transport, TransportEvent};

pub struct ChatSession<T> {
    config: SessionConfig,
    transport: T,
    /// Bumped on every connect and teardown.
    epoch: u64,
    /// Token of the connection currently owned, if any.
    token: Option<String>,
    connection: ConnectionState,
    context: ConversationContext,
    messages: Vec<ChatMessage>,
    pending_history: HistoryRequests,
    is_typing: bool,
    /// Sends in the active context still waiting for a reply.
    outstanding_replies: usize,
    /// Conversation ids of contexts switched away from.
    retired_conversations: Vec<String>,
    last_error: Option<Notice>,
    usage_limits: Option<UsageLimits>,
}

impl<T: Transport> ChatSession<T> {
    #[must_use]
    pub fn new(config: SessionConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            epoch: 0,
            token: None,
            connection: ConnectionState::default(),
            context: ConversationContext::default(),
            messages: Vec::new(),
            pending_history: HistoryRequests::default(),
            is_typing: false,
            outstanding_replies: 0,
            retired_conversations: Vec::new(),
            last_error: None,
            usage_limits: None,
        }
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.messages.clone(),
            connection: self.connection.clone(),
            context: self.context.clone(),
            is_typing: self.is_typing,
            awaiting_reply: self.outstanding_replies > 0 && self.connection.is_connected(),
            last_error: self.last_error.clone(),
            usage_limits: self.usage_limits.clone(),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    #[must_use]
    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&Notice> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =========================================================================
    // CALLER OPERATIONS
    // =========================================================================

    /// Connect with `token` and make `context_id` the active context.
    ///
    /// A no-op when already connected (or connecting) with the same token.
    /// A different token tears the old connection down first.
    ///
    /// # Errors
    ///
    /// [`SessionError::MissingToken`] for a blank token,
    /// [`SessionError::InvalidToken`] for one that cannot be sent as a bearer
    /// credential, and [`SessionError::Config`] for a missing or malformed service URL. Both
    /// also leave the connection in the error state; no connection is tried.
    pub fn start(&mut self, token: &str, context_id: &str) -> Result<(), SessionError> {
        self.switch_context(context_id);
        self.connect_with(token)
    }

    /// React to the identity provider: sign-out stops, sign-in or token
    /// refresh (re)connects for the active context.
    ///
    /// # Errors
    ///
    /// As [`ChatSession::start`].
    pub fn apply_identity(&mut self, identity: Option<&Identity>) -> Result<(), SessionError> {
        match identity {
            None => {
                if self.token.is_some() || self.connection != ConnectionState::default() {
                    info!("session: identity cleared");
                    self.stop();
                }
                Ok(())
            }
            Some(identity) => {
                debug!(user_id = %identity.user_id, "session: identity changed");
                self.connect_with(&identity.access_token)
            }
        }
    }

    /// Make `context_id` the active context.
    ///
    /// The message list and conversation id are cleared before this returns.
    /// History for the new context is requested now if connected, otherwise
    /// on the next successful connect.
    pub fn switch_context(&mut self, context_id: &str) {
        let context_id = context_id.trim();
        if self.context.context_id.as_deref() == Some(context_id) {
            return;
        }

        info!(from = ?self.context.context_id, to = context_id, "session: switching context");
        if let Some(retired) = self.context.conversation_id.take() {
            self.retired_conversations.push(retired);
        }
        self.context = ConversationContext {
            context_id: (!context_id.is_empty()).then(|| context_id.to_owned()),
            conversation_id: None,
        };
        self.messages.clear();
        self.is_typing = false;
        self.outstanding_replies = 0;
        self.last_error = None;
        self.usage_limits = None;

        if self.connection.is_connected() {
            self.request_history();
        }
    }

    /// Send `content` to the tutor. Returns the temporary id of the
    /// optimistic message.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyContent`], [`SessionError::NoContext`] or
    /// [`SessionError::NotConnected`]; nothing is appended or sent and a
    /// validation notice is recorded.
    pub fn send(&mut self, content: &str) -> Result<String, SessionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(self.reject(SessionError::EmptyContent));
        }
        self.check_sendable()?;

        let message = ChatMessage::pending_user(content);
        let id = message.id.clone();
        debug!(message_id = %id, "session: sending");
        self.messages.push(message);
        self.clear_validation_notice();
        self.dispatch(&id);
        Ok(id)
    }

    /// Resend a failed message under the same id.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownMessage`], [`SessionError::NotRetryable`] when
    /// the message has not failed, or the same errors as [`ChatSession::send`]
    /// when sending is impossible right now.
    pub fn retry(&mut self, message_id: &str) -> Result<(), SessionError> {
        match self.messages.iter().find(|m| m.id == message_id).map(ChatMessage::is_failed) {
            None => return Err(self.reject(SessionError::UnknownMessage(message_id.to_owned()))),
            Some(false) => return Err(self.reject(SessionError::NotRetryable(message_id.to_owned()))),
            Some(true) => {}
        }
        self.check_sendable()?;

        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.mark_pending();
        }
        debug!(message_id, "session: retrying");
        self.clear_validation_notice();
        self.dispatch(message_id);
        Ok(())
    }

    /// Close the connection on purpose. Messages are kept.
    pub fn stop(&mut self) {
        self.teardown();
        self.connection.disconnected();
        info!(epoch = self.epoch, "session: stopped");
    }

    pub fn dismiss_notice(&mut self) {
        self.last_error = None;
    }

    // =========================================================================
    // TRANSPORT EVENTS
    // =========================================================================

    /// Apply one transport event. Events from a superseded connection are
    /// ignored.
    pub fn handle_event(&mut self, inbound: InboundEvent) {
        if inbound.epoch != self.epoch || self.token.is_none() {
            debug!(event_epoch = inbound.epoch, epoch = self.epoch, "session: dropping stale transport event");
            return;
        }

        match inbound.event {
            TransportEvent::Connecting { attempt } => self.on_connecting(attempt),
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::ConnectError { reason, auth_rejected } => self.on_connect_error(&reason, auth_rejected),
            TransportEvent::Disconnected { reason } => self.on_disconnected(&reason),
            TransportEvent::ReconnectExhausted { attempts } => self.on_reconnect_exhausted(attempts),
            TransportEvent::Server(event) => self.on_server_event(event),
        }
    }

    fn on_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { client_id } => {
                debug!(client_id = ?client_id, "session: service acknowledged connection");
            }
            ServerEvent::UserMessageAck { message } => self.on_user_ack(&message),
            ServerEvent::AssistantMessage { message } => self.on_assistant_message(&message),
            ServerEvent::Typing { active } => self.on_typing(active),
            ServerEvent::SendError { reason, client_id } => self.on_send_error(&reason, client_id.as_deref()),
            ServerEvent::History { context_id, messages, usage_limits } => {
                self.on_history(context_id.as_deref(), &messages, usage_limits);
            }
            ServerEvent::HistoryError { reason, context_id } => {
                self.on_history_error(&reason, context_id.as_deref());
            }
        }
    }

    fn on_connecting(&mut self, attempt: u32) {
        debug!(epoch = self.epoch, attempt, "session: connecting");
        self.connection.connecting(attempt);
    }

    fn on_connected(&mut self) {
        info!(epoch = self.epoch, context_id = ?self.context.context_id, "session: connected");
        self.connection.connected();
        self.pending_history.clear();
        self.request_history();
    }

    fn on_connect_error(&mut self, reason: &str, auth_rejected: bool) {
        if auth_rejected {
            warn!(epoch = self.epoch, reason, "session: authentication rejected");
            self.connection
                .failed_terminal(format!("The tutor service rejected your sign-in ({reason}). Please sign in again."));
        } else {
            warn!(epoch = self.epoch, reason, "session: connect failed");
            self.connection
                .failed(format!("Could not reach the tutor service ({reason})."));
        }
    }

    fn on_disconnected(&mut self, reason: &str) {
        warn!(epoch = self.epoch, reason, "session: connection lost");
        self.connection
            .failed(format!("Connection to the tutor was lost ({reason}). Reconnecting..."));
        self.pending_history.clear();
        self.is_typing = false;
    }

    fn on_reconnect_exhausted(&mut self, attempts: u32) {
        warn!(epoch = self.epoch, attempts, "session: reconnection exhausted");
        let message = match self.connection.error.take() {
            Some(last) => format!("{last} Gave up after {attempts} reconnection attempts."),
            None => format!("Gave up after {attempts} reconnection attempts."),
        };
        self.connection.failed_terminal(message);
    }

    fn on_user_ack(&mut self, message: &ServerMessage) {
        if !self.belongs_to_conversation(message) {
            debug!(message_id = %message.id, "session: ignoring ack for another conversation");
            return;
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(message_id = %message.id, "session: duplicate ack");
            return;
        }

        match self.find_unconfirmed(message.client_id.as_deref(), &message.content) {
            Some(idx) => {
                debug!(local_id = %self.messages[idx].id, server_id = %message.id, "session: send confirmed");
                self.messages[idx].confirm(message);
                self.adopt_conversation(message.conversation_id.as_deref());
            }
            None => debug!(server_id = %message.id, "session: ack for unknown send"),
        }
    }

    fn on_assistant_message(&mut self, message: &ServerMessage) {
        if !self.belongs_to_conversation(message) {
            debug!(message_id = %message.id, "session: ignoring reply for another conversation");
            return;
        }
        let answered = match message.reply_to.as_deref() {
            Some(id) => match self.messages.iter().position(|m| m.is_named(id)) {
                Some(idx) => Some(idx),
                None => {
                    debug!(message_id = %message.id, reply_to = id, "session: ignoring reply to a message outside this context");
                    return;
                }
            },
            None if self.outstanding_replies > 0 || self.in_conversation(message) => None,
            None => {
                debug!(message_id = %message.id, "session: ignoring uncorrelated reply");
                return;
            }
        };
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(message_id = %message.id, "session: duplicate assistant message");
            return;
        }

        self.is_typing = false;
        self.outstanding_replies = self.outstanding_replies.saturating_sub(1);
        if let Some(idx) = answered {
            // Delivered, but still waiting for the ack to carry the server id.
            if self.messages[idx].is_pending() {
                self.messages[idx].mark_sent();
            }
            self.adopt_conversation(message.conversation_id.as_deref());
        }
        self.messages.push(ChatMessage::from_server(message));
    }

    fn on_typing(&mut self, active: bool) {
        if self.connection.is_connected() && self.context.context_id.is_some() {
            self.is_typing = active;
        }
    }

    fn on_send_error(&mut self, reason: &str, client_id: Option<&str>) {
        let target = match client_id {
            Some(id) => self.messages.iter().position(|m| m.is_named(id) && m.is_in_flight()),
            None => self.messages.iter().rposition(ChatMessage::is_pending),
        };
        match target {
            Some(idx) => {
                warn!(message_id = %self.messages[idx].id, reason, "session: send failed");
                self.messages[idx].mark_failed(reason);
                self.outstanding_replies = self.outstanding_replies.saturating_sub(1);
                self.is_typing = false;
            }
            None => warn!(reason, "session: send error for unknown message"),
        }
    }

    fn on_history(&mut self, echoed: Option<&str>, messages: &[ServerMessage], usage_limits: Option<UsageLimits>) {
        let Some(target) = self.pending_history.resolve(echoed) else {
            warn!("session: discarding unsolicited history");
            return;
        };
        if self.context.context_id.as_deref() != Some(target.as_str()) {
            debug!(context_id = %target, "session: discarding stale history");
            return;
        }

        if usage_limits.is_some() {
            self.usage_limits = usage_limits;
        }
        if self.last_error.as_ref().is_some_and(|n| n.kind == NoticeKind::History) {
            self.last_error = None;
        }

        if messages.is_empty() {
            if self.messages.is_empty() {
                debug!(context_id = %target, "session: empty history, showing welcome");
                self.messages.push(ChatMessage::welcome(&target));
            }
            return;
        }

        debug!(context_id = %target, count = messages.len(), "session: installing history");
        self.context.conversation_id = messages[0].conversation_id.clone();
        if let Some(current) = &self.context.conversation_id {
            self.retired_conversations.retain(|c| c != current);
        }
        self.messages = merge_history(&self.messages, messages);
    }

    fn on_history_error(&mut self, reason: &str, echoed: Option<&str>) {
        let target = self.pending_history.resolve(echoed);
        if target.is_some() && target.as_deref() != self.context.context_id.as_deref() {
            debug!(context_id = ?target, "session: discarding stale history error");
            return;
        }
        warn!(reason, "session: history unavailable");
        self.last_error = Some(Notice::new(
            NoticeKind::History,
            format!("Could not load the conversation history ({reason})."),
        ));
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn connect_with(&mut self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(self.fail_start(SessionError::MissingToken));
        }
        if !is_valid_token(token) {
            return Err(self.fail_start(SessionError::InvalidToken));
        }
        if let Err(e) = self.config.validate() {
            return Err(self.fail_start(e.into()));
        }
        if self.connection.is_live() && self.token.as_deref() == Some(token) {
            debug!(epoch = self.epoch, "session: already connected with this token");
            return Ok(());
        }

        self.teardown();
        self.token = Some(token.to_owned());
        self.connection.connecting(0);
        info!(epoch = self.epoch, "session: connecting");
        self.transport.connect(self.epoch, token);
        Ok(())
    }

    /// Configuration problem: no transport attempt, manual action needed.
    fn fail_start(&mut self, error: SessionError) -> SessionError {
        warn!(error = %error, "session: cannot start");
        self.teardown();
        self.connection.failed_terminal(error.to_string());
        error
    }

    /// Drop the owned connection, if any, and invalidate its events.
    fn teardown(&mut self) {
        if self.token.take().is_some() {
            self.transport.disconnect();
        }
        self.epoch += 1;
        self.pending_history.clear();
        self.is_typing = false;
    }

    fn check_sendable(&mut self) -> Result<(), SessionError> {
        if self.context.context_id.is_none() {
            return Err(self.reject(SessionError::NoContext));
        }
        if !self.connection.is_connected() {
            return Err(self.reject(SessionError::NotConnected));
        }
        Ok(())
    }

    fn reject(&mut self, error: SessionError) -> SessionError {
        debug!(error = %error, "session: request rejected");
        self.last_error = Some(Notice::new(NoticeKind::Validation, error.to_string()));
        error
    }

    fn clear_validation_notice(&mut self) {
        if self.last_error.as_ref().is_some_and(|n| n.kind == NoticeKind::Validation) {
            self.last_error = None;
        }
    }

    /// Emit the message with `id` as a `send_message` event.
    fn dispatch(&mut self, id: &str) {
        let Some(context_id) = self.context.context_id.clone() else {
            return;
        };
        let Some(idx) = self.messages.iter().position(|m| m.id == id) else {
            return;
        };

        let event = ClientEvent::SendMessage {
            content: self.messages[idx].content.clone(),
            context_id,
            conversation_id: self.context.conversation_id.clone(),
            client_id: id.to_owned(),
        };
        match self.transport.emit(event) {
            Ok(()) => self.outstanding_replies += 1,
            Err(e) => {
                warn!(message_id = id, error = %e, "session: emit failed");
                self.messages[idx].mark_failed(e.to_string());
            }
        }
    }

    fn request_history(&mut self) {
        let Some(context_id) = self.context.context_id.clone() else {
            return;
        };
        let event = ClientEvent::RequestHistory {
            context_id: context_id.clone(),
            limit: self.config.history_limit,
            offset: 0,
        };
        match self.transport.emit(event) {
            Ok(()) => {
                debug!(context_id = %context_id, "session: history requested");
                self.pending_history.push(context_id);
            }
            Err(e) => {
                warn!(context_id = %context_id, error = %e, "session: history request failed");
                self.last_error = Some(Notice::new(
                    NoticeKind::History,
                    format!("Could not load the conversation history ({e})."),
                ));
            }
        }
    }

    /// Index of the optimistic entry a confirmation refers to.
    fn find_unconfirmed(&self, client_id: Option<&str>, content: &str) -> Option<usize> {
        if let Some(client_id) = client_id {
            return self
                .messages
                .iter()
                .position(|m| m.is_named(client_id) && m.is_unconfirmed());
        }
        self.messages
            .iter()
            .position(|m| m.is_in_flight() && m.content == content)
            .or_else(|| self.messages.iter().position(ChatMessage::is_in_flight))
    }

    fn adopt_conversation(&mut self, conversation_id: Option<&str>) {
        if self.context.conversation_id.is_none() {
            if let Some(id) = conversation_id {
                debug!(conversation_id = id, "session: conversation assigned");
                self.context.conversation_id = Some(id.to_owned());
            }
        }
    }

    /// False for messages of another or a retired conversation.
    fn belongs_to_conversation(&self, message: &ServerMessage) -> bool {
        match (&self.context.conversation_id, &message.conversation_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            (None, Some(theirs)) => !self.retired_conversations.contains(theirs),
            _ => true,
        }
    }

    fn in_conversation(&self, message: &ServerMessage) -> bool {
        self.context.conversation_id.is_some() && self.context.conversation_id == message.conversation_id
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
