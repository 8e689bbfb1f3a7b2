//! Per-inbox synchronization session.
//!
//! A session owns exactly one push client, one store, one refresher, and
//! one read coordinator for a single inbox, with an explicit
//! `init`/`teardown` lifecycle. Nothing it starts outlives `teardown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notisync_core::config::AppConfig;
use notisync_core::events::{InboxEvent, InboxEvents};
use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId, SessionId};
use notisync_service::metrics::MetricsSnapshot;
use notisync_service::{
    ListenerId, MarkOutcome, NotificationApi, NotificationStateStore, PollOutcome,
    PollingRefresher, ReadStateCoordinator, StoreSnapshot, SyncMetrics,
};

use crate::channel::TopicSubscriptionManager;
use crate::connection::{ConnectionState, ReconnectingSocketClient};
use crate::transport::{ConnectTarget, PushTransport};

/// Everything needed to keep one inbox in sync.
pub struct NotificationSession {
    id: SessionId,
    inbox: InboxId,
    store: Arc<NotificationStateStore>,
    reads: Arc<ReadStateCoordinator>,
    refresher: Arc<PollingRefresher>,
    client: Arc<ReconnectingSocketClient>,
    target: ConnectTarget,
    subscriptions: Arc<TopicSubscriptionManager>,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl std::fmt::Debug for NotificationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSession")
            .field("id", &self.id)
            .field("inbox", &self.inbox)
            .field("state", &self.client.state())
            .finish()
    }
}

impl NotificationSession {
    /// Build and start a session for `inbox`.
    ///
    /// Starts the polling timer (whose first refresh runs immediately) and,
    /// when the push channel is enabled, binds the inbox topic.
    pub async fn init(
        inbox: InboxId,
        config: &AppConfig,
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn PushTransport>,
        events: InboxEvents,
    ) -> Arc<Self> {
        let id = SessionId::new();
        let metrics = Arc::new(SyncMetrics::new());
        let store = Arc::new(NotificationStateStore::new(
            inbox,
            config.store.clone(),
            events.clone(),
            metrics.clone(),
        ));
        let reads = Arc::new(ReadStateCoordinator::new(
            api.clone(),
            store.clone(),
            std::time::Duration::from_millis(config.api.request_timeout_ms),
            metrics.clone(),
        ));
        let refresher = Arc::new(
            PollingRefresher::new(api, store.clone(), config.polling.clone(), metrics.clone())
                .with_ack_retry(reads.clone()),
        );

        let (client, frames) =
            ReconnectingSocketClient::new(config.realtime.clone(), transport, metrics.clone());
        let client = Arc::new(client);
        let target = ConnectTarget::new(config.realtime.endpoint.clone())
            .with_token(config.api.auth_token.clone());
        let subscriptions = Arc::new(TopicSubscriptionManager::new(
            client.clone(),
            target.clone(),
            config.realtime.topic_prefix.clone(),
            metrics.clone(),
        ));

        let cancel = CancellationToken::new();
        let session = Arc::new(Self {
            id,
            inbox,
            store,
            reads,
            refresher,
            client,
            target,
            subscriptions,
            metrics,
            cancel,
            tasks: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
        });

        let mut tasks = vec![
            session
                .subscriptions
                .run(frames, session.cancel.child_token()),
            session.spawn_resync(events.subscribe()),
        ];

        if config.realtime.enabled {
            session.subscriptions.bind(session.store.clone()).await;
        } else {
            info!(session = %id, inbox = %inbox, "Push channel disabled; polling only");
        }

        if config.polling.enabled {
            if let Some(handle) = session.refresher.start() {
                tasks.push(handle);
            }
        } else {
            session.refresher.refresh().await;
        }

        session
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(tasks);
        info!(session = %id, inbox = %inbox, "Notification session started");
        session
    }

    /// Follow resync requests and connection changes.
    ///
    /// A resync request for this inbox and every reconnect after the first
    /// connection trigger an immediate poll, so pushes missed while the
    /// channel was down are picked up.
    fn spawn_resync(self: &Arc<Self>, mut events: broadcast::Receiver<InboxEvent>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let cancel = self.cancel.child_token();
        let mut states: watch::Receiver<ConnectionState> = self.client.state_changes();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(InboxEvent::ResyncRequested { inbox }) if inbox == this.inbox => {
                            debug!(inbox = %inbox, "Resync requested");
                            this.refresher.refresh().await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Event bus lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        match state {
                            ConnectionState::Connected if this.client.epoch() > 1 => {
                                info!(inbox = %this.inbox, "Push channel restored; catching up");
                                this.refresher.refresh().await;
                            }
                            ConnectionState::Failed => {
                                warn!(inbox = %this.inbox, "Push channel failed; relying on polling");
                            }
                            _ => {}
                        }
                    }
                }
            }
        })
    }

    /// Stop everything the session started. Idempotent.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.refresher.stop();
        self.subscriptions.unbind().await;
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(session = %self.id, error = %e, "Session task panicked");
                }
            }
        }
        info!(session = %self.id, inbox = %self.inbox, "Notification session torn down");
    }

    /// Whether `teardown` has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Session identifier for log correlation.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Inbox this session serves.
    pub fn inbox(&self) -> InboxId {
        self.inbox
    }

    /// Shared read access to the store.
    pub fn store(&self) -> &Arc<NotificationStateStore> {
        &self.store
    }

    /// Read-state coordinator.
    pub fn reads(&self) -> &Arc<ReadStateCoordinator> {
        &self.reads
    }

    /// Polling refresher.
    pub fn refresher(&self) -> &Arc<PollingRefresher> {
        &self.refresher
    }

    /// Subscription manager.
    pub fn subscriptions(&self) -> &Arc<TopicSubscriptionManager> {
        &self.subscriptions
    }

    /// Push channel state.
    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Observe push channel state changes.
    pub fn connection_changes(&self) -> watch::Receiver<ConnectionState> {
        self.client.state_changes()
    }

    /// Manually restart the push channel after it gave up.
    ///
    /// Only meaningful from `Failed` or `Disconnected` while the inbox is
    /// bound; otherwise a no-op.
    pub fn reconnect(&self) {
        if self.is_torn_down() || self.subscriptions.bound().is_none() {
            debug!(inbox = %self.inbox, "reconnect() ignored; push channel not bound");
            return;
        }
        self.client.connect(self.target.clone());
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current store snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Attach a store listener.
    pub fn subscribe(&self, listener: impl Fn(&StoreSnapshot) + Send + Sync + 'static) -> ListenerId {
        self.store.subscribe(listener)
    }

    /// Mark one notification read (optimistic, best-effort acknowledgement).
    pub async fn mark_read(&self, id: NotificationId) -> MarkOutcome {
        self.reads.mark_read(id).await
    }

    /// Mark every notification read.
    pub async fn mark_all_read(&self) -> Vec<NotificationId> {
        self.reads.mark_all_read().await
    }

    /// Delete a notification.
    pub async fn delete(&self, id: NotificationId) -> AppResult<()> {
        self.reads.delete(id).await
    }

    /// Poll now.
    pub async fn refresh(&self) -> PollOutcome {
        self.refresher.refresh().await
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.refresher.stop();
    }
}
