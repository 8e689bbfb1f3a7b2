//! Push transports.
//!
//! The reconnecting client only needs a way to open a STOMP session and a
//! pair of halves to write and read frames on it. [`TungsteniteTransport`]
//! speaks STOMP over a real WebSocket; [`MemoryTransport`] is an in-process
//! peer for tests and local demos.

pub mod memory;
pub mod tungstenite;

use async_trait::async_trait;

use notisync_core::result::AppResult;

use crate::stomp::{HeartBeat, Inbound, NegotiatedHeartBeat, StompFrame};

pub use memory::{ConnectBehavior, MemoryPeer, MemoryTransport};
pub use tungstenite::TungsteniteTransport;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// WebSocket endpoint URL.
    pub endpoint: String,
    /// Bearer token presented in the STOMP `CONNECT` frame.
    pub auth_token: Option<String>,
}

impl ConnectTarget {
    /// Target without credentials.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Writing half of an established STOMP session.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame.
    async fn send(&mut self, frame: &StompFrame) -> AppResult<()>;

    /// Send a bare EOL keep-alive.
    async fn send_heartbeat(&mut self) -> AppResult<()>;

    /// Close the underlying connection.
    async fn close(&mut self) -> AppResult<()>;
}

/// Reading half of an established STOMP session.
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound frame or heart-beat. `Ok(None)` means the peer closed.
    ///
    /// Must be cancel-safe: dropping the future loses nothing.
    async fn next(&mut self) -> AppResult<Option<Inbound>>;
}

/// An established STOMP session.
pub struct PushConnection {
    /// Heart-beat intervals agreed during the handshake.
    pub heartbeat: NegotiatedHeartBeat,
    /// Writing half.
    pub sink: Box<dyn FrameSink>,
    /// Reading half.
    pub stream: Box<dyn FrameStream>,
}

impl std::fmt::Debug for PushConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConnection")
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

/// Opens STOMP sessions.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Open a socket, perform the STOMP handshake offering `heartbeat`, and
    /// return the established session. Callers bound this with a timeout.
    async fn connect(&self, target: &ConnectTarget, heartbeat: HeartBeat) -> AppResult<PushConnection>;
}
