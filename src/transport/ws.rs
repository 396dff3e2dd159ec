//! WebSocket transport for the chat service.
//!
//! `WsTransport` owns at most one connection task. The task connects,
//! relays outbound frames from an unbounded channel, decodes inbound frames,
//! and reconnects with exponential backoff when the connection drops.
//!
//! LIFECYCLE
//! =========
//! 1. `connect` spawns the task; it reports `Connecting { attempt: 0 }`
//! 2. Handshake accepted → `Connected`; frames flow both ways
//! 3. Remote drop → `Disconnected`, then `Connecting { attempt: n }` after a
//!    backoff delay, until the policy's attempt budget is spent
//!    (`ReconnectExhausted`)
//! 4. HTTP 401/403 on the handshake → `ConnectError { auth_rejected: true }`,
//!    never retried
//! 5. `disconnect` aborts the task; no further events are produced
//!
//! A socket URL or token that cannot form a handshake request is a local
//! setup error: `connect` reports `ConnectError { auth_rejected: false }`
//! followed by `ReconnectExhausted { attempts: 0 }` and spawns nothing.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::backoff::ReconnectPolicy;
use super::{InboundEvent, Transport, TransportError, TransportEvent};
use crate::config::SessionConfig;
use events::ClientEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    config: SessionConfig,
    events: mpsc::UnboundedSender<InboundEvent>,
    active: Option<ActiveConnection>,
}

struct ActiveConnection {
    epoch: u64,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl WsTransport {
    /// Create a transport that reports events on `events`.
    ///
    /// `connect` spawns onto the ambient tokio runtime and must be called
    /// from within one.
    #[must_use]
    pub fn new(config: SessionConfig, events: mpsc::UnboundedSender<InboundEvent>) -> Self {
        Self { config, events, active: None }
    }

    /// Local setup failure: nothing to retry, so report the budget as spent.
    fn reject_setup(&self, epoch: u64, reason: String) {
        warn!(epoch, %reason, "ws: cannot open connection");
        let _ = self
            .events
            .send(InboundEvent::new(epoch, TransportEvent::ConnectError { reason, auth_rejected: false }));
        let _ = self
            .events
            .send(InboundEvent::new(epoch, TransportEvent::ReconnectExhausted { attempts: 0 }));
    }
}

fn bearer_value(token: &str) -> Result<HeaderValue, String> {
    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| "access token is not a valid header value".to_owned())
}

impl Transport for WsTransport {
    fn connect(&mut self, epoch: u64, token: &str) {
        self.disconnect();

        let setup = self
            .config
            .socket_url()
            .map_err(|e| e.to_string())
            .and_then(|url| bearer_value(token).map(|bearer| (url, bearer)));
        let (url, bearer) = match setup {
            Ok(setup) => setup,
            Err(reason) => {
                self.reject_setup(epoch, reason);
                return;
            }
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let params = ConnectParams {
            url,
            bearer,
            epoch,
            policy: self.config.reconnect,
            connect_timeout: self.config.connect_timeout,
        };
        let task = tokio::spawn(connection_loop(params, self.events.clone(), outbound_rx));
        self.active = Some(ActiveConnection { epoch, outbound, task });
    }

    fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(epoch = active.epoch, "ws: closing connection");
            active.task.abort();
        }
    }

    fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        let Some(active) = &self.active else {
            return Err(TransportError::NotConnected);
        };
        let text = events::encode_event(&event)
            .map_err(|e| TransportError::Encode { event: event.name(), message: e.to_string() })?;
        active
            .outbound
            .send(text)
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

struct ConnectParams {
    url: String,
    bearer: HeaderValue,
    epoch: u64,
    policy: ReconnectPolicy,
    connect_timeout: std::time::Duration,
}

#[derive(Debug)]
struct OpenError {
    reason: String,
    auth_rejected: bool,
}

enum ConnectionEnd {
    /// The server or network ended the connection.
    Remote(String),
    /// The owning transport went away.
    Closed,
}

async fn connection_loop(
    params: ConnectParams,
    events: mpsc::UnboundedSender<InboundEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(InboundEvent::new(params.epoch, event));
    };
    let mut attempt: u32 = 0;

    loop {
        emit(TransportEvent::Connecting { attempt });

        match open(&params).await {
            Ok(stream) => {
                info!(epoch = params.epoch, url = %params.url, "ws: connected");
                attempt = 0;
                emit(TransportEvent::Connected);

                match run_connection(stream, params.epoch, &events, &mut outbound).await {
                    ConnectionEnd::Remote(reason) => {
                        warn!(epoch = params.epoch, %reason, "ws: connection lost");
                        emit(TransportEvent::Disconnected { reason });
                    }
                    ConnectionEnd::Closed => return,
                }
            }
            Err(error) => {
                warn!(epoch = params.epoch, reason = %error.reason, auth_rejected = error.auth_rejected, "ws: connect failed");
                emit(TransportEvent::ConnectError { reason: error.reason, auth_rejected: error.auth_rejected });
                if error.auth_rejected {
                    return;
                }
            }
        }

        attempt += 1;
        if !params.policy.allows(attempt) {
            let attempts = attempt - 1;
            warn!(epoch = params.epoch, attempts, "ws: giving up on reconnect");
            emit(TransportEvent::ReconnectExhausted { attempts });
            return;
        }
        let delay = params.policy.delay_for(attempt);
        debug!(epoch = params.epoch, attempt, delay_ms = delay.as_millis(), "ws: reconnect scheduled");
        tokio::time::sleep(delay).await;
    }
}

async fn open(params: &ConnectParams) -> Result<WsStream, OpenError> {
    let mut request = params
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| OpenError { reason: e.to_string(), auth_rejected: false })?;
    request.headers_mut().insert(AUTHORIZATION, params.bearer.clone());

    match tokio::time::timeout(params.connect_timeout, connect_async(request)).await {
        Err(_) => Err(OpenError {
            reason: format!("timed out after {}s", params.connect_timeout.as_secs()),
            auth_rejected: false,
        }),
        Ok(Err(error)) => Err(classify_connect_error(&error)),
        Ok(Ok((stream, _response))) => Ok(stream),
    }
}

fn classify_connect_error(error: &tungstenite::Error) -> OpenError {
    if let tungstenite::Error::Http(response) = error {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return OpenError {
                reason: format!("authentication rejected (HTTP {})", status.as_u16()),
                auth_rejected: true,
            };
        }
        return OpenError { reason: format!("handshake rejected (HTTP {})", status.as_u16()), auth_rejected: false };
    }
    OpenError { reason: error.to_string(), auth_rejected: false }
}

async fn run_connection(
    stream: WsStream,
    epoch: u64,
    events: &mpsc::UnboundedSender<InboundEvent>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> ConnectionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                None => return ConnectionEnd::Remote("connection closed by server".to_owned()),
                Some(Err(e)) => return ConnectionEnd::Remote(e.to_string()),
                Some(Ok(Message::Text(text))) => match events::decode_event(text.as_str()) {
                    Ok(event) => {
                        let _ = events.send(InboundEvent::new(epoch, TransportEvent::Server(event)));
                    }
                    Err(e) => warn!(epoch, error = %e, "ws: dropping undecodable frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "connection closed by server".to_owned());
                    return ConnectionEnd::Remote(reason);
                }
                Some(Ok(_)) => {}
            },
            out = outbound.recv() => match out {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        return ConnectionEnd::Remote(e.to_string());
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return ConnectionEnd::Closed;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
