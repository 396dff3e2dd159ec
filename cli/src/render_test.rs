use tutorchat::session::message::MessageOrigin;
use tutorchat::session::snapshot::{Notice, NoticeKind, UsageLimits};

use super::*;

fn connected() -> ChatSnapshot {
    let mut snapshot = ChatSnapshot::default();
    snapshot.connection.status = ConnectionStatus::Connected;
    snapshot.context.context_id = Some("ch-2".to_owned());
    snapshot
}

#[test]
fn no_change_renders_nothing() {
    let snapshot = connected();
    assert!(render_changes(&snapshot, &snapshot.clone()).is_empty());
}

#[test]
fn status_and_context_changes() {
    let prev = ChatSnapshot::default();
    let next = connected();
    assert_eq!(render_changes(&prev, &next), vec!["[context] ch-2", "[status] connected"]);
}

#[test]
fn terminal_error_offers_reconnect() {
    let connection = ConnectionState {
        status: ConnectionStatus::Error,
        error: Some("Gave up after 5 reconnection attempts.".to_owned()),
        retry_available: true,
        attempt: 0,
    };
    assert_eq!(
        render_connection(&connection),
        "[status] error: Gave up after 5 reconnection attempts. (/reconnect to try again)"
    );
}

#[test]
fn reconnect_attempt_is_shown() {
    let connection = ConnectionState { status: ConnectionStatus::Connecting, attempt: 3, ..ConnectionState::default() };
    assert_eq!(render_connection(&connection), "[status] reconnecting (attempt 3)");
}

#[test]
fn new_pending_message_then_confirmation() {
    let prev = connected();
    let mut next = prev.clone();
    let pending = ChatMessage::pending_user("Summarize chapter 2");
    next.messages.push(pending.clone());
    assert_eq!(render_changes(&prev, &next), vec!["you (sending): Summarize chapter 2"]);

    let mut confirmed = next.clone();
    confirmed.messages[0].id = "m-101".to_owned();
    confirmed.messages[0].delivery = DeliveryState::Sent;
    confirmed.messages[0].origin = MessageOrigin::Server;
    assert_eq!(render_changes(&next, &confirmed), vec!["[sent] m-101"]);
}

#[test]
fn failure_shows_retry_hint() {
    let mut prev = connected();
    prev.messages.push(ChatMessage::pending_user("hello"));
    let id = prev.messages[0].id.clone();

    let mut next = prev.clone();
    next.messages[0].mark_failed("rate limited");
    assert_eq!(render_changes(&prev, &next), vec![format!("[failed] {id}: rate limited (/retry {id})")]);
}

#[test]
fn typing_notice_and_usage() {
    let prev = connected();
    let mut next = prev.clone();
    next.is_typing = true;
    next.last_error = Some(Notice::new(NoticeKind::History, "Could not load the conversation history."));
    next.usage_limits = Some(UsageLimits { messages_used: Some(4), messages_limit: Some(20), resets_at: None });

    assert_eq!(
        render_changes(&prev, &next),
        vec![
            "[tutor is typing...]",
            "[notice] Could not load the conversation history. (/dismiss to clear)",
            "[usage] 4/20 messages",
        ]
    );
}

#[test]
fn assistant_message_renders_as_tutor() {
    let prev = connected();
    let mut next = prev.clone();
    let mut reply = ChatMessage::pending_user("Chapter 2 covers...");
    reply.role = Role::Assistant;
    reply.delivery = DeliveryState::Sent;
    reply.origin = MessageOrigin::Server;
    next.messages.push(reply);
    assert_eq!(render_changes(&prev, &next), vec!["tutor: Chapter 2 covers..."]);
}
