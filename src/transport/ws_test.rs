use super::*;
use events::ServerEvent;
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

fn config(base_url: &str, max_attempts: u32) -> SessionConfig {
    let mut cfg = SessionConfig::new(base_url);
    cfg.reconnect = ReconnectPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
    };
    cfg.connect_timeout = Duration::from_secs(2);
    cfg
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{addr}"))
}

#[allow(clippy::result_large_err)]
fn check_bearer(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    let auth = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if auth == Some("Bearer good-token") {
        Ok(resp)
    } else {
        let mut err = ErrorResponse::new(Some("unauthorized".to_owned()));
        *err.status_mut() = StatusCode::UNAUTHORIZED;
        Err(err)
    }
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = listener.accept().await.expect("accept");
    tokio_tungstenite::accept_hdr_async(tcp, check_bearer)
        .await
        .expect("handshake")
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> InboundEvent {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("event timed out")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) {
    assert!(
        timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
        "expected no transport event"
    );
}

#[test]
fn emit_without_connection_is_rejected() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config("http://127.0.0.1:1", 0), tx);
    let err = transport
        .emit(ClientEvent::RequestHistory { context_id: "ch-1".to_owned(), limit: 10, offset: 0 })
        .expect_err("no connection");
    assert_eq!(err, TransportError::NotConnected);
}

#[test]
fn classify_connect_error_keeps_io_errors_retryable() {
    let error = classify_connect_error(&tungstenite::Error::ConnectionClosed);
    assert!(!error.auth_rejected);
    assert!(!error.reason.is_empty());
}

#[tokio::test]
async fn connect_reports_lifecycle_and_relays_frames() {
    let (listener, base) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config(&base, 0), tx);

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let history = ServerEvent::History {
            context_id: Some("ch-1".to_owned()),
            messages: Vec::new(),
            usage_limits: None,
        };
        let text = events::encode_event(&history).expect("encode");
        ws.send(Message::Text(text.into())).await.expect("send history");
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<ClientEvent>(text.as_str()).expect("client event");
                }
                Some(Ok(_)) => {}
                other => panic!("unexpected server read: {other:?}"),
            }
        }
    });

    transport.connect(7, "good-token");
    assert_eq!(next_event(&mut rx).await, InboundEvent::new(7, TransportEvent::Connecting { attempt: 0 }));
    assert_eq!(next_event(&mut rx).await, InboundEvent::new(7, TransportEvent::Connected));

    let inbound = next_event(&mut rx).await;
    assert_eq!(inbound.epoch, 7);
    assert!(matches!(
        inbound.event,
        TransportEvent::Server(ServerEvent::History { ref context_id, .. }) if context_id.as_deref() == Some("ch-1")
    ));

    let request = ClientEvent::RequestHistory { context_id: "ch-1".to_owned(), limit: 50, offset: 0 };
    transport.emit(request.clone()).expect("emit");
    let received = timeout(Duration::from_secs(3), server)
        .await
        .expect("server timed out")
        .expect("server task");
    assert_eq!(received, request);
}

#[tokio::test]
async fn auth_rejection_is_reported_and_not_retried() {
    let (listener, base) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config(&base, 3), tx);

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        assert!(tokio_tungstenite::accept_hdr_async(tcp, check_bearer).await.is_err());
    });

    transport.connect(1, "stale-token");
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connecting { attempt: 0 });
    match next_event(&mut rx).await.event {
        TransportEvent::ConnectError { reason, auth_rejected } => {
            assert!(auth_rejected);
            assert!(reason.contains("401"), "reason: {reason}");
        }
        other => panic!("expected connect error, got {other:?}"),
    }
    assert_no_event(&mut rx).await;
    server.await.expect("server task");
}

#[tokio::test]
async fn unreachable_server_exhausts_reconnect_budget() {
    let (listener, base) = bind().await;
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config(&base, 2), tx);
    transport.connect(3, "good-token");

    for attempt in 0..=2 {
        assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connecting { attempt });
        assert!(matches!(
            next_event(&mut rx).await.event,
            TransportEvent::ConnectError { auth_rejected: false, .. }
        ));
    }
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::ReconnectExhausted { attempts: 2 });
}

#[tokio::test]
async fn server_close_reports_disconnect_then_reconnects() {
    let (listener, base) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config(&base, 1), tx);

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        ws.close(None).await.expect("close");
        // Keep the listener alive long enough for the reconnect attempt.
        let _second = listener.accept().await;
    });

    transport.connect(2, "good-token");
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connecting { attempt: 0 });
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connected);
    assert!(matches!(next_event(&mut rx).await.event, TransportEvent::Disconnected { .. }));
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connecting { attempt: 1 });

    transport.disconnect();
    server.abort();
}

#[tokio::test]
async fn disconnect_stops_events_and_outbound_queue() {
    let (listener, base) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config(&base, 3), tx);

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    transport.connect(4, "good-token");
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connecting { attempt: 0 });
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Connected);

    transport.disconnect();
    let err = transport
        .emit(ClientEvent::RequestHistory { context_id: "ch-1".to_owned(), limit: 1, offset: 0 })
        .expect_err("disconnected");
    assert_eq!(err, TransportError::NotConnected);
    assert_no_event(&mut rx).await;
    server.abort();
}

#[tokio::test]
async fn unsendable_token_is_a_setup_error_not_an_auth_rejection() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(config("http://127.0.0.1:1", 3), tx);
    transport.connect(4, "bad\ntoken");

    match next_event(&mut rx).await {
        InboundEvent { epoch: 4, event: TransportEvent::ConnectError { reason, auth_rejected } } => {
            assert!(!auth_rejected);
            assert!(reason.contains("header"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        next_event(&mut rx).await,
        InboundEvent::new(4, TransportEvent::ReconnectExhausted { attempts: 0 })
    );
    assert_no_event(&mut rx).await;
    assert_eq!(
        transport.emit(ClientEvent::RequestHistory { context_id: "ch-1".to_owned(), limit: 1, offset: 0 }),
        Err(TransportError::NotConnected)
    );
}
