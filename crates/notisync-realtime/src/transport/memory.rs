//! In-process transport for tests and local demos.
//!
//! Each accepted connection yields a [`MemoryPeer`] that plays the server:
//! it can deliver frames, send heart-beats, drop the connection, and
//! inspect what the client sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use notisync_core::error::AppError;
use notisync_core::result::AppResult;

use super::{ConnectTarget, FrameSink, FrameStream, PushConnection, PushTransport};
use crate::stomp::{HeartBeat, Inbound, StompCommand, StompFrame};

/// How the memory transport answers one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Complete the handshake.
    Accept,
    /// Fail the handshake immediately.
    Refuse,
    /// Never answer; the caller's timeout fires.
    Hang,
}

#[derive(Debug)]
struct MemoryState {
    script: VecDeque<ConnectBehavior>,
    fallback: ConnectBehavior,
    server_heartbeat: HeartBeat,
    targets: Vec<ConnectTarget>,
    peers: Vec<MemoryPeer>,
}

/// In-memory [`PushTransport`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    accepted: Arc<Notify>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A transport that accepts every connection and negotiates no heart-beats.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                script: VecDeque::new(),
                fallback: ConnectBehavior::Accept,
                server_heartbeat: HeartBeat::default(),
                targets: Vec::new(),
                peers: Vec::new(),
            })),
            accepted: Arc::new(Notify::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Heart-beat header the simulated server answers with.
    pub fn with_server_heartbeat(self, heartbeat: HeartBeat) -> Self {
        self.state().server_heartbeat = heartbeat;
        self
    }

    /// Queue behaviors for the next attempts, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = ConnectBehavior>) {
        self.state().script.extend(behaviors);
    }

    /// Behavior once the script is exhausted.
    pub fn set_fallback(&self, behavior: ConnectBehavior) {
        self.state().fallback = behavior;
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.state().targets.len()
    }

    /// Targets of every attempt, in order.
    pub fn targets(&self) -> Vec<ConnectTarget> {
        self.state().targets.clone()
    }

    /// Number of accepted connections so far.
    pub fn accepted(&self) -> usize {
        self.state().peers.len()
    }

    /// Server side of the most recently accepted connection.
    pub fn latest_peer(&self) -> Option<MemoryPeer> {
        self.state().peers.last().cloned()
    }

    /// Wait until the `index`-th (zero-based) connection is accepted.
    pub async fn peer(&self, index: usize) -> MemoryPeer {
        loop {
            let notified = self.accepted.notified();
            if let Some(peer) = self.state().peers.get(index).cloned() {
                return peer;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    async fn connect(&self, target: &ConnectTarget, heartbeat: HeartBeat) -> AppResult<PushConnection> {
        let (behavior, server_heartbeat) = {
            let mut state = self.state();
            state.targets.push(target.clone());
            let fallback = state.fallback;
            let behavior = state.script.pop_front().unwrap_or(fallback);
            (behavior, state.server_heartbeat)
        };

        match behavior {
            ConnectBehavior::Refuse => {
                return Err(AppError::transport(format!(
                    "Connection to {} refused",
                    target.endpoint
                )));
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
            ConnectBehavior::Accept => {}
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(PeerLog::default()));
        let peer = MemoryPeer {
            tx,
            log: log.clone(),
            target: target.clone(),
        };
        self.state().peers.push(peer);
        self.accepted.notify_waiters();

        Ok(PushConnection {
            heartbeat: HeartBeat::negotiate(heartbeat, server_heartbeat),
            sink: Box::new(MemorySink { log }),
            stream: Box::new(MemoryStream { rx }),
        })
    }
}

#[derive(Debug)]
enum ServerEvent {
    Inbound(Inbound),
    Close,
    Fail(String),
}

#[derive(Debug, Default)]
struct PeerLog {
    frames: Vec<StompFrame>,
    heartbeats: usize,
    closed: bool,
}

/// Server side of one in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<ServerEvent>,
    log: Arc<Mutex<PeerLog>>,
    target: ConnectTarget,
}

impl MemoryPeer {
    fn log(&self) -> MutexGuard<'_, PeerLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Target the client connected with.
    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// Deliver a frame to the client.
    pub fn deliver(&self, frame: StompFrame) {
        let _ = self.tx.send(ServerEvent::Inbound(Inbound::Frame(frame)));
    }

    /// Deliver a `MESSAGE` on `subscription` with a JSON body.
    pub fn message(&self, subscription: &str, body: impl Into<String>) {
        self.deliver(
            StompFrame::new(StompCommand::Message)
                .header("subscription", subscription)
                .header("content-type", "application/json")
                .with_body(body),
        );
    }

    /// Send a bare heart-beat to the client.
    pub fn heartbeat(&self) {
        let _ = self.tx.send(ServerEvent::Inbound(Inbound::Heartbeat));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.tx.send(ServerEvent::Close);
    }

    /// Break the connection with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(ServerEvent::Fail(reason.into()));
    }

    /// Frames the client sent, in order.
    pub fn sent(&self) -> Vec<StompFrame> {
        self.log().frames.clone()
    }

    /// Commands the client sent, in order.
    pub fn sent_commands(&self) -> Vec<StompCommand> {
        self.log().frames.iter().map(|f| f.command).collect()
    }

    /// Number of heart-beats the client sent.
    pub fn heartbeats_received(&self) -> usize {
        self.log().heartbeats
    }

    /// Whether the client closed its side.
    pub fn is_closed_by_client(&self) -> bool {
        self.log().closed
    }
}

struct MemorySink {
    log: Arc<Mutex<PeerLog>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: &StompFrame) -> AppResult<()> {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if log.closed {
            return Err(AppError::transport("Memory connection already closed"));
        }
        log.frames.push(frame.clone());
        Ok(())
    }

    async fn send_heartbeat(&mut self) -> AppResult<()> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).heartbeats += 1;
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).closed = true;
        Ok(())
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next(&mut self) -> AppResult<Option<Inbound>> {
        match self.rx.recv().await {
            Some(ServerEvent::Inbound(inbound)) => Ok(Some(inbound)),
            Some(ServerEvent::Close) | None => Ok(None),
            Some(ServerEvent::Fail(reason)) => Err(AppError::transport(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_attempts() {
        let transport = MemoryTransport::new();
        transport.script([ConnectBehavior::Refuse]);
        let target = ConnectTarget::new("ws://memory");

        assert!(transport.connect(&target, HeartBeat::default()).await.is_err());
        assert!(transport.connect(&target, HeartBeat::default()).await.is_ok());
        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.accepted(), 1);
    }

    #[tokio::test]
    async fn test_peer_exchanges_frames() {
        let transport = MemoryTransport::new().with_server_heartbeat(HeartBeat::new(5_000, 5_000));
        let mut conn = transport
            .connect(&ConnectTarget::new("ws://memory"), HeartBeat::new(10_000, 10_000))
            .await
            .unwrap();
        assert!(conn.heartbeat.send_every.is_some());
        let peer = transport.peer(0).await;

        conn.sink.send(&StompFrame::subscribe("s", "/topic/x")).await.unwrap();
        conn.sink.send_heartbeat().await.unwrap();
        assert_eq!(peer.sent_commands(), vec![StompCommand::Subscribe]);
        assert_eq!(peer.heartbeats_received(), 1);

        peer.heartbeat();
        peer.close();
        assert_eq!(conn.stream.next().await.unwrap(), Some(Inbound::Heartbeat));
        assert_eq!(conn.stream.next().await.unwrap(), None);
    }
}
