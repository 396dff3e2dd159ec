use super::*;

fn server_user(id: &str, content: &str) -> ServerMessage {
    ServerMessage {
        id: id.to_owned(),
        role: Role::User,
        content: content.to_owned(),
        created_at: Some(1234),
        conversation_id: None,
        client_id: None,
        reply_to: None,
    }
}

#[test]
fn pending_user_gets_unique_local_id() {
    let a = ChatMessage::pending_user("hello");
    let b = ChatMessage::pending_user("hello");
    assert!(a.id.starts_with(LOCAL_ID_PREFIX));
    assert_ne!(a.id, b.id);
    assert_eq!(a.role, Role::User);
    assert!(a.is_pending());
    assert!(a.is_unconfirmed());
    assert_eq!(a.origin, MessageOrigin::Local);
}

#[test]
fn confirm_adopts_server_identity() {
    let mut msg = ChatMessage::pending_user("Summarize chapter 2");
    msg.confirm(&server_user("m-101", "Summarize chapter 2"));
    assert_eq!(msg.id, "m-101");
    assert_eq!(msg.timestamp, 1234);
    assert_eq!(msg.delivery, DeliveryState::Sent);
    assert_eq!(msg.origin, MessageOrigin::Server);
    assert!(!msg.is_unconfirmed());
}

#[test]
fn failed_then_pending_clears_error_detail() {
    let mut msg = ChatMessage::pending_user("hello");
    msg.mark_failed("quota exceeded");
    assert!(msg.is_failed());
    assert_eq!(msg.error_detail.as_deref(), Some("quota exceeded"));
    assert!(msg.is_unconfirmed());

    msg.mark_pending();
    assert!(msg.is_pending());
    assert!(msg.error_detail.is_none());
}

#[test]
fn from_server_is_terminal() {
    let msg = ChatMessage::from_server(&server_user("m-1", "hi"));
    assert_eq!(msg.delivery, DeliveryState::Sent);
    assert_eq!(msg.origin, MessageOrigin::Server);
    assert!(!msg.is_unconfirmed());
}

#[test]
fn from_server_without_timestamp_uses_now() {
    let mut server = server_user("m-1", "hi");
    server.created_at = None;
    let msg = ChatMessage::from_server(&server);
    assert!(msg.timestamp > 0);
}

#[test]
fn welcome_is_tagged_assistant_message_for_context() {
    let msg = ChatMessage::welcome("ch-1");
    assert_eq!(msg.id, "welcome-ch-1");
    assert_eq!(msg.role, Role::Assistant);
    assert!(msg.is_welcome());
    assert!(msg.content.contains("ch-1"));
    assert!(!msg.is_unconfirmed());
}

#[test]
fn sent_local_entry_stays_unconfirmed_until_acknowledged() {
    let mut msg = ChatMessage::pending_user("question");
    msg.mark_sent();
    assert!(msg.is_unconfirmed());
    assert!(msg.is_in_flight());

    msg.mark_failed("rejected");
    assert!(msg.is_unconfirmed());
    assert!(!msg.is_in_flight());
}

#[test]
fn confirmed_entry_answers_to_both_ids() {
    let mut msg = ChatMessage::pending_user("question");
    let local_id = msg.id.clone();
    msg.confirm(&server_user("m-7", "question"));
    assert!(msg.is_named("m-7"));
    assert!(msg.is_named(&local_id));
    assert!(!msg.is_named("m-8"));
    assert!(!ChatMessage::welcome("ch-1").is_named("local-x"));
}
