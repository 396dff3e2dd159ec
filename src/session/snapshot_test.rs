use super::*;

#[test]
fn transcript_excludes_welcome() {
    let question = ChatMessage::pending_user("What is chapter 1 about?");
    let snapshot = ChatSnapshot {
        messages: vec![ChatMessage::welcome("ch-1"), question.clone()],
        ..ChatSnapshot::default()
    };
    assert_eq!(snapshot.transcript(), vec![&question]);
    assert_eq!(snapshot.message(&question.id), Some(&question));
    assert_eq!(snapshot.message("missing"), None);
}

#[test]
fn busy_while_typing_or_awaiting_reply() {
    let mut snapshot = ChatSnapshot::default();
    assert!(!snapshot.is_busy());
    snapshot.awaiting_reply = true;
    assert!(snapshot.is_busy());
    snapshot.awaiting_reply = false;
    snapshot.is_typing = true;
    assert!(snapshot.is_busy());
}

#[test]
fn snapshot_serializes_for_presentation() {
    let snapshot = ChatSnapshot {
        last_error: Some(Notice::new(NoticeKind::Validation, "message is empty")),
        ..ChatSnapshot::default()
    };
    let json = serde_json::to_value(&snapshot).expect("serialize");
    assert_eq!(json["connection"]["status"], "disconnected");
    assert_eq!(json["last_error"]["kind"], "validation");
}
