//! STOMP over `tokio-tungstenite`.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;

use super::{ConnectTarget, FrameSink, FrameStream, PushConnection, PushTransport};
use crate::stomp::{self, HeartBeat, Inbound, StompCommand, StompFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport: WebSocket text messages carrying STOMP 1.2 frames.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    max_frame_bytes: usize,
}

impl TungsteniteTransport {
    /// Create a transport rejecting frames larger than `max_frame_bytes`.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

fn ws_error(context: &str, e: tokio_tungstenite::tungstenite::Error) -> AppError {
    AppError::with_source(ErrorKind::Transport, context.to_string(), e)
}

/// Host part of a `ws://` / `wss://` URL, for the STOMP `host` header.
fn host_of(endpoint: &str) -> &str {
    let rest = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let authority = rest.split('/').next().unwrap_or(rest);
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    authority.split(':').next().unwrap_or(authority)
}

#[async_trait]
impl PushTransport for TungsteniteTransport {
    async fn connect(&self, target: &ConnectTarget, heartbeat: HeartBeat) -> AppResult<PushConnection> {
        let (ws, _response) = tokio_tungstenite::connect_async(target.endpoint.as_str())
            .await
            .map_err(|e| ws_error("WebSocket handshake failed", e))?;
        let (mut write, read) = ws.split();
        let mut stream = TungsteniteStream {
            read,
            pending: VecDeque::new(),
            max_frame_bytes: self.max_frame_bytes,
        };

        let connect = StompFrame::connect(
            host_of(&target.endpoint),
            heartbeat,
            target.auth_token.as_deref(),
        );
        write
            .send(Message::text(stomp::encode(&connect)))
            .await
            .map_err(|e| ws_error("Failed to send STOMP CONNECT", e))?;

        let connected = loop {
            match stream.next().await? {
                Some(Inbound::Heartbeat) => continue,
                Some(Inbound::Frame(frame)) => match frame.command {
                    StompCommand::Connected => break frame,
                    StompCommand::Error => {
                        return Err(AppError::transport(format!(
                            "STOMP handshake rejected: {}",
                            frame.get("message").unwrap_or(frame.body.as_str())
                        )));
                    }
                    other => {
                        debug!(command = %other, "Ignoring frame before CONNECTED");
                    }
                },
                None => {
                    return Err(AppError::transport(
                        "Connection closed during STOMP handshake",
                    ));
                }
            }
        };

        let server_heartbeat = match connected.get("heart-beat") {
            Some(value) => HeartBeat::parse(value)?,
            None => HeartBeat::default(),
        };
        debug!(
            endpoint = %target.endpoint,
            version = connected.get("version").unwrap_or("?"),
            server_heartbeat = %server_heartbeat,
            "STOMP session established"
        );

        Ok(PushConnection {
            heartbeat: HeartBeat::negotiate(heartbeat, server_heartbeat),
            sink: Box::new(TungsteniteSink { write }),
            stream: Box::new(stream),
        })
    }
}

struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send(&mut self, frame: &StompFrame) -> AppResult<()> {
        self.write
            .send(Message::text(stomp::encode(frame)))
            .await
            .map_err(|e| ws_error("Failed to send STOMP frame", e))
    }

    async fn send_heartbeat(&mut self) -> AppResult<()> {
        self.write
            .send(Message::text("\n"))
            .await
            .map_err(|e| ws_error("Failed to send heart-beat", e))
    }

    async fn close(&mut self) -> AppResult<()> {
        self.write
            .close()
            .await
            .map_err(|e| ws_error("Failed to close WebSocket", e))
    }
}

struct TungsteniteStream {
    read: SplitStream<WsStream>,
    pending: VecDeque<Inbound>,
    max_frame_bytes: usize,
}

/// Decode one text payload into `pending`. A malformed payload is dropped on
/// its own but still queues a heart-beat, since any bytes from the server
/// prove it is alive.
fn absorb(pending: &mut VecDeque<Inbound>, text: &str, max_frame_bytes: usize) {
    match stomp::decode(text, max_frame_bytes) {
        Ok(items) => pending.extend(items),
        Err(e) => {
            warn!(error = %e, "Dropping undecodable STOMP payload");
            pending.push_back(Inbound::Heartbeat);
        }
    }
}

#[async_trait]
impl FrameStream for TungsteniteStream {
    async fn next(&mut self) -> AppResult<Option<Inbound>> {
        loop {
            if let Some(inbound) = self.pending.pop_front() {
                return Ok(Some(inbound));
            }
            let message = match self.read.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(ws_error("WebSocket read failed", e)),
                Some(Ok(message)) => message,
            };
            match message {
                Message::Text(text) => absorb(&mut self.pending, text.as_str(), self.max_frame_bytes),
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => absorb(&mut self.pending, text, self.max_frame_bytes),
                    Err(_) => {
                        warn!(len = bytes.len(), "Dropping non-UTF-8 binary message");
                        self.pending.push_back(Inbound::Heartbeat);
                    }
                },
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket closed by server");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("wss://jobs.example.com/ws"), "jobs.example.com");
        assert_eq!(host_of("ws://localhost:8080/ws"), "localhost");
        assert_eq!(host_of("ws://user@10.0.0.2:61614"), "10.0.0.2");
        assert_eq!(host_of("localhost"), "localhost");
    }

    #[test]
    fn test_undecodable_payload_still_counts_as_liveness() {
        let mut pending = VecDeque::new();
        absorb(&mut pending, "NOT-A-COMMAND\n\nbody\0", 65_536);
        assert!(matches!(pending.pop_front(), Some(Inbound::Heartbeat)));
        assert!(pending.is_empty());

        absorb(&mut pending, "\n", 65_536);
        assert!(matches!(pending.pop_front(), Some(Inbound::Heartbeat)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let transport = TungsteniteTransport::new(65_536);
        let err = transport
            .connect(&ConnectTarget::new("ws://127.0.0.1:1/ws"), HeartBeat::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
    }
}
