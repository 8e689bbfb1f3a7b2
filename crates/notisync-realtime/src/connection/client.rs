//! Reconnecting push client.
//!
//! One supervisor task owns the live connection. It performs the bounded
//! handshake, pumps frames in both directions, enforces heart-beats, and
//! runs the reconnect policy. Transport errors never reach callers; they
//! only move the state machine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use notisync_core::config::realtime::RealtimeConfig;
use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_service::SyncMetrics;

use super::backoff::ReconnectPolicy;
use super::state::ConnectionState;
use crate::stomp::{HeartBeat, Inbound, StompCommand, StompFrame};
use crate::transport::{ConnectTarget, PushConnection, PushTransport};

/// How a served connection ended.
enum Served {
    /// `disconnect()` was called.
    Cancelled,
    /// The connection broke.
    Lost(AppError),
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    config: RealtimeConfig,
    policy: ReconnectPolicy,
    transport: Arc<dyn PushTransport>,
    metrics: Arc<SyncMetrics>,
    state_tx: watch::Sender<ConnectionState>,
    frames_tx: mpsc::Sender<StompFrame>,
    outbound: Mutex<Option<mpsc::Sender<StompFrame>>>,
    intentional_close: AtomicBool,
    epoch: AtomicU64,
    target: Mutex<Option<ConnectTarget>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Push channel state changed");
        }
    }

    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<StompFrame>>> {
        self.outbound.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Route one inbound frame. An `ERROR` frame ends the connection.
    fn dispatch(&self, frame: StompFrame) -> AppResult<()> {
        match frame.command {
            StompCommand::Message => {
                SyncMetrics::inc(&self.metrics.frames_received);
                match self.frames_tx.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        SyncMetrics::inc(&self.metrics.frames_dropped);
                        warn!("Inbound frame buffer full, dropping MESSAGE");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("No frame consumer, dropping MESSAGE");
                    }
                }
                Ok(())
            }
            StompCommand::Error => Err(AppError::transport(format!(
                "Server sent ERROR: {}",
                frame.get("message").unwrap_or(frame.body.as_str())
            ))),
            other => {
                trace!(command = %other, "Ignoring inbound frame");
                Ok(())
            }
        }
    }
}

/// Maintains at most one live push connection and reconnects with a
/// bounded policy.
pub struct ReconnectingSocketClient {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ReconnectingSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSocketClient")
            .field("state", &self.state())
            .finish()
    }
}

impl ReconnectingSocketClient {
    /// Create a disconnected client. Inbound `MESSAGE` frames arrive on the
    /// returned receiver.
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn PushTransport>,
        metrics: Arc<SyncMetrics>,
    ) -> (Self, mpsc::Receiver<StompFrame>) {
        let (frames_tx, frames_rx) = mpsc::channel(config.frame_buffer_size.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let client = Self {
            shared: Arc::new(Shared {
                policy: ReconnectPolicy::from_config(&config),
                config,
                transport,
                metrics,
                state_tx,
                frames_tx,
                outbound: Mutex::new(None),
                intentional_close: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                target: Mutex::new(None),
            }),
            running: Mutex::new(None),
        };
        (client, frames_rx)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Observe state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Number of successful handshakes so far; changes on every new
    /// `Connected`.
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Target of the most recent `connect()`.
    pub fn target(&self) -> Option<ConnectTarget> {
        self.shared
            .target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Start connecting to `target`.
    ///
    /// No-op while `Connecting`, `Connected` or `Reconnecting`. From
    /// `Disconnected` or `Failed` this starts a fresh supervisor with the
    /// attempt counter at zero.
    pub fn connect(&self, target: ConnectTarget) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.state();
        if current.is_active() {
            debug!(state = %current, "connect() ignored; push channel already active");
            return;
        }
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
        }

        self.shared.intentional_close.store(false, Ordering::SeqCst);
        *self.shared.target.lock().unwrap_or_else(|e| e.into_inner()) = Some(target.clone());
        self.shared.set_state(ConnectionState::Connecting);
        info!(endpoint = %target.endpoint, "Push channel connecting");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(self.shared.clone(), target, cancel.clone()));
        *running = Some(Running { cancel, handle });
    }

    /// Close the connection on purpose.
    ///
    /// Any close or error observed after this call never schedules a
    /// reconnect. Returns once the supervisor has exited.
    pub async fn disconnect(&self) {
        self.shared.intentional_close.store(true, Ordering::SeqCst);
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "Push channel supervisor panicked");
                }
            }
        }
        *self.shared.outbound() = None;

        let previous = self.shared.state_tx.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!(from = %previous, "Push channel disconnected");
        }
    }

    /// Send a frame on the live connection.
    pub async fn send(&self, frame: StompFrame) -> AppResult<()> {
        let tx = self
            .shared
            .outbound()
            .clone()
            .ok_or_else(|| AppError::transport("Push channel is not connected"))?;
        tx.send(frame)
            .await
            .map_err(|_| AppError::transport("Push connection closed before frame was sent"))
    }
}

impl Drop for ReconnectingSocketClient {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(running) = running {
            self.shared.intentional_close.store(true, Ordering::SeqCst);
            running.cancel.cancel();
        }
    }
}

async fn supervise(shared: Arc<Shared>, target: ConnectTarget, cancel: CancellationToken) {
    let config = &shared.config;
    let offer = HeartBeat::new(config.heartbeat_outgoing_ms, config.heartbeat_incoming_ms);
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(ConnectionState::Connecting);
        let handshake = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(
                config.connect_timeout(),
                shared.transport.connect(&target, offer),
            ) => result,
        };

        let failure = match handshake {
            Ok(Ok(connection)) => {
                attempt = 0;
                let (tx, rx) = mpsc::channel(config.frame_buffer_size.max(1));
                *shared.outbound() = Some(tx);
                let epoch = shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                shared.set_state(ConnectionState::Connected);
                info!(endpoint = %target.endpoint, epoch, "Push channel connected");

                let served = serve(&shared, connection, rx, &cancel).await;
                *shared.outbound() = None;
                match served {
                    Served::Cancelled => break,
                    Served::Lost(e) => e,
                }
            }
            Ok(Err(e)) => e,
            Err(_) => AppError::timeout(format!(
                "Handshake did not complete within {}ms",
                config.connect_timeout_ms
            )),
        };

        if cancel.is_cancelled() || shared.intentional_close.load(Ordering::SeqCst) {
            debug!(error = %failure, "Connection ended after intentional close; not reconnecting");
            break;
        }

        attempt += 1;
        if !shared.policy.allows(attempt) {
            shared.set_state(ConnectionState::Failed);
            error!(
                endpoint = %target.endpoint,
                attempts = attempt - 1,
                error = %failure,
                "Push channel failed; falling back to polling until connect() is called again"
            );
            return;
        }

        let delay = shared.policy.delay(attempt);
        SyncMetrics::inc(&shared.metrics.reconnects);
        shared.set_state(ConnectionState::Reconnecting { attempt });
        warn!(
            endpoint = %target.endpoint,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "Push channel lost; scheduling reconnect"
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(endpoint = %target.endpoint, "Push channel supervisor exited");
}

async fn serve(
    shared: &Shared,
    connection: PushConnection,
    mut outbound: mpsc::Receiver<StompFrame>,
    cancel: &CancellationToken,
) -> Served {
    let PushConnection {
        heartbeat,
        mut sink,
        mut stream,
    } = connection;

    let mut send_tick = heartbeat.send_every.map(|every| {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let idle_limit = heartbeat
        .expect_every
        .map(|every| silence_limit(every, shared.config.heartbeat_grace_factor));
    let mut last_seen = Instant::now();

    loop {
        let idle_deadline = idle_limit.and_then(|limit| last_seen.checked_add(limit));
        tokio::select! {
            _ = cancel.cancelled() => {
                // frames queued before disconnect() (e.g. UNSUBSCRIBE) go out first
                while let Ok(frame) = outbound.try_recv() {
                    if sink.send(&frame).await.is_err() {
                        break;
                    }
                }
                if let Err(e) = sink.send(&StompFrame::disconnect()).await {
                    debug!(error = %e, "Could not send DISCONNECT");
                }
                if let Err(e) = sink.close().await {
                    debug!(error = %e, "Could not close push connection cleanly");
                }
                return Served::Cancelled;
            }
            inbound = stream.next() => match inbound {
                Ok(Some(Inbound::Heartbeat)) => {
                    last_seen = Instant::now();
                    trace!("Heart-beat received");
                }
                Ok(Some(Inbound::Frame(frame))) => {
                    last_seen = Instant::now();
                    if let Err(e) = shared.dispatch(frame) {
                        let _ = sink.close().await;
                        return Served::Lost(e);
                    }
                }
                Ok(None) => return Served::Lost(AppError::transport("Push connection closed by server")),
                Err(e) => return Served::Lost(e),
            },
            Some(frame) = outbound.recv() => {
                trace!(command = %frame.command, "Sending frame");
                if let Err(e) = sink.send(&frame).await {
                    return Served::Lost(e);
                }
            }
            _ = next_tick(&mut send_tick) => {
                if let Err(e) = sink.send_heartbeat().await {
                    return Served::Lost(e);
                }
            }
            _ = idle(idle_deadline) => {
                let _ = sink.close().await;
                return Served::Lost(AppError::transport(format!(
                    "No heart-beat from server within {}ms",
                    idle_limit.map(|d| d.as_millis()).unwrap_or_default()
                )));
            }
        }
    }
}

/// Silence tolerated from the server before the connection is declared dead.
/// A grace factor that yields no representable duration falls back to twice
/// the negotiated interval.
fn silence_limit(expect_every: Duration, grace_factor: f64) -> Duration {
    Duration::try_from_secs_f64(expect_every.as_secs_f64() * grace_factor)
        .unwrap_or_else(|_| expect_every.saturating_mul(2))
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
