use super::*;

#[test]
fn default_is_disconnected_without_error() {
    let state = ConnectionState::default();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(state.error.is_none());
    assert!(!state.retry_available);
    assert!(!state.is_live());
}

#[test]
fn reconnect_attempt_keeps_last_error() {
    let mut state = ConnectionState::default();
    state.failed("connection lost");
    state.connecting(2);
    assert_eq!(state.status, ConnectionStatus::Connecting);
    assert_eq!(state.attempt, 2);
    assert_eq!(state.error.as_deref(), Some("connection lost"));
    assert!(state.is_live());
}

#[test]
fn initial_connect_clears_error() {
    let mut state = ConnectionState::default();
    state.failed_terminal("auth rejected");
    state.connecting(0);
    assert!(state.error.is_none());
    assert!(!state.retry_available);
}

#[test]
fn connected_resets_everything() {
    let mut state = ConnectionState::default();
    state.failed_terminal("boom");
    state.connected();
    assert!(state.is_connected());
    assert!(state.error.is_none());
    assert_eq!(state.attempt, 0);
    assert!(!state.retry_available);
}

#[test]
fn terminal_failure_offers_retry() {
    let mut state = ConnectionState::default();
    state.failed_terminal("gave up");
    assert_eq!(state.status, ConnectionStatus::Error);
    assert!(state.retry_available);
    state.disconnected();
    assert_eq!(state, ConnectionState::default());
}
