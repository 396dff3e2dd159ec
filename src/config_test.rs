use std::collections::HashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn from_lookup_applies_defaults() {
    let cfg = SessionConfig::from_lookup(lookup(&[("TUTORCHAT_BASE_URL", "https://tutor.example.test/")])).unwrap();
    assert_eq!(cfg.base_url, "https://tutor.example.test");
    assert_eq!(cfg.socket_path, DEFAULT_SOCKET_PATH);
    assert_eq!(cfg.history_limit, DEFAULT_HISTORY_LIMIT);
    assert_eq!(cfg.reconnect.max_attempts, DEFAULT_RECONNECT_ATTEMPTS);
    assert_eq!(cfg.reconnect.base_delay, Duration::from_millis(DEFAULT_RECONNECT_BASE_MS));
    assert_eq!(cfg.reconnect.max_delay, Duration::from_millis(DEFAULT_RECONNECT_MAX_MS));
    assert_eq!(cfg.connect_timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = SessionConfig::from_lookup(lookup(&[
        ("TUTORCHAT_BASE_URL", "http://127.0.0.1:4000"),
        ("TUTORCHAT_SOCKET_PATH", "ws/chat"),
        ("TUTORCHAT_HISTORY_LIMIT", "20"),
        ("TUTORCHAT_RECONNECT_ATTEMPTS", "2"),
        ("TUTORCHAT_RECONNECT_BASE_MS", "250"),
        ("TUTORCHAT_RECONNECT_MAX_MS", "4000"),
        ("TUTORCHAT_CONNECT_TIMEOUT_SECS", "3"),
    ]))
    .unwrap();
    assert_eq!(cfg.socket_path, "/ws/chat");
    assert_eq!(cfg.history_limit, 20);
    assert_eq!(cfg.reconnect.max_attempts, 2);
    assert_eq!(cfg.reconnect.base_delay, Duration::from_millis(250));
    assert_eq!(cfg.reconnect.max_delay, Duration::from_millis(4000));
    assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
    assert_eq!(cfg.socket_url().unwrap(), "ws://127.0.0.1:4000/ws/chat");
}

#[test]
fn from_lookup_missing_base_url_errors() {
    let err = SessionConfig::from_lookup(lookup(&[])).unwrap_err();
    assert_eq!(err, ConfigError::MissingBaseUrl);

    let err = SessionConfig::from_lookup(lookup(&[("TUTORCHAT_BASE_URL", "   ")])).unwrap_err();
    assert_eq!(err, ConfigError::MissingBaseUrl);
}

#[test]
fn from_lookup_rejects_non_http_base_url() {
    let err = SessionConfig::from_lookup(lookup(&[("TUTORCHAT_BASE_URL", "ftp://host")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidBaseUrl("ftp://host".to_owned()));
}

#[test]
fn from_lookup_rejects_unparseable_numbers() {
    let err = SessionConfig::from_lookup(lookup(&[
        ("TUTORCHAT_BASE_URL", "http://host"),
        ("TUTORCHAT_HISTORY_LIMIT", "lots"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("TUTORCHAT_HISTORY_LIMIT"));
}

#[test]
fn socket_url_maps_https_to_wss() {
    let cfg = SessionConfig::new("https://tutor.example.test");
    assert_eq!(cfg.socket_url().unwrap(), "wss://tutor.example.test/chat");
}

#[test]
fn validate_flags_empty_base_url() {
    let cfg = SessionConfig::new("");
    assert_eq!(cfg.validate().unwrap_err(), ConfigError::MissingBaseUrl);
    assert_eq!(cfg.socket_url().unwrap_err(), ConfigError::MissingBaseUrl);
}
