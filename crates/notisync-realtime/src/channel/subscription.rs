//! Topic subscription management.
//!
//! Keeps exactly one `SUBSCRIBE` alive for the bound inbox across
//! reconnects, and feeds decoded `MESSAGE` frames into the inbox store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notisync_core::types::InboxId;
use notisync_entity::NotificationRecord;
use notisync_service::{NotificationStateStore, SyncMetrics};

use crate::connection::{ConnectionState, ReconnectingSocketClient};
use crate::stomp::{StompCommand, StompFrame};
use crate::transport::ConnectTarget;

/// The subscription currently registered with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    /// STOMP subscription id.
    pub id: String,
    /// Full STOMP destination.
    pub destination: String,
    /// Inbox the subscription serves.
    pub inbox: InboxId,
    /// Connection epoch the subscription was made on.
    pub epoch: u64,
}

/// Binds one inbox to the push channel.
pub struct TopicSubscriptionManager {
    client: Arc<ReconnectingSocketClient>,
    target: ConnectTarget,
    topic_prefix: String,
    metrics: Arc<SyncMetrics>,
    binding: Mutex<Option<Arc<NotificationStateStore>>>,
    active: Mutex<Option<ActiveSubscription>>,
    next_id: AtomicU64,
    switching: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for TopicSubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicSubscriptionManager")
            .field("bound", &self.bound())
            .field("active", &self.active())
            .finish()
    }
}

impl TopicSubscriptionManager {
    /// Create an unbound manager driving `client`.
    pub fn new(
        client: Arc<ReconnectingSocketClient>,
        target: ConnectTarget,
        topic_prefix: impl Into<String>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            client,
            target,
            topic_prefix: topic_prefix.into(),
            metrics,
            binding: Mutex::new(None),
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            switching: tokio::sync::Mutex::new(()),
        }
    }

    fn binding(&self) -> MutexGuard<'_, Option<Arc<NotificationStateStore>>> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<ActiveSubscription>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// STOMP destination for `inbox`.
    pub fn destination_for(&self, inbox: InboxId) -> String {
        format!("{}{}", self.topic_prefix, inbox.topic())
    }

    /// Inbox currently bound, if any.
    pub fn bound(&self) -> Option<InboxId> {
        self.binding().as_ref().map(|store| store.inbox())
    }

    /// Subscription currently registered, if any.
    pub fn active(&self) -> Option<ActiveSubscription> {
        self.active_slot().clone()
    }

    /// Bind `store`'s inbox to the push channel and connect.
    ///
    /// Binding a different inbox first unsubscribes and fully disconnects
    /// the previous identity, so two inboxes are never subscribed at once.
    pub async fn bind(&self, store: Arc<NotificationStateStore>) {
        let _switch = self.switching.lock().await;
        let inbox = store.inbox();

        match self.bound() {
            Some(current) if current == inbox => {
                debug!(inbox = %inbox, "Inbox already bound");
                return;
            }
            Some(current) => {
                info!(from = %current, to = %inbox, "Switching push channel identity");
                self.release().await;
            }
            None => {}
        }

        *self.binding() = Some(store);
        self.client.connect(self.target.clone());
        if self.client.state() == ConnectionState::Connected {
            self.ensure_subscribed().await;
        }
    }

    /// Unsubscribe, disconnect, and forget the bound inbox. Idempotent.
    pub async fn unbind(&self) {
        let _switch = self.switching.lock().await;
        self.release().await;
        *self.binding() = None;
    }

    async fn release(&self) {
        self.unsubscribe().await;
        self.client.disconnect().await;
    }

    /// Send `UNSUBSCRIBE` for the active subscription, if it is still live.
    /// Safe to call at any time, any number of times.
    pub async fn unsubscribe(&self) {
        let Some(active) = self.active_slot().take() else {
            return;
        };
        let live = self.client.state() == ConnectionState::Connected
            && self.client.epoch() == active.epoch;
        if !live {
            debug!(id = %active.id, "Subscription already void with its connection");
            return;
        }
        match self.client.send(StompFrame::unsubscribe(&active.id)).await {
            Ok(()) => debug!(id = %active.id, inbox = %active.inbox, "Unsubscribed"),
            Err(e) => debug!(id = %active.id, error = %e, "UNSUBSCRIBE not sent"),
        }
    }

    /// React to a connection state change.
    pub async fn on_state(&self, state: ConnectionState) {
        if state == ConnectionState::Connected {
            self.ensure_subscribed().await;
        } else if let Some(void) = self.active_slot().take() {
            debug!(id = %void.id, state = %state, "Subscription void after leaving Connected");
        }
    }

    /// Subscribe on the current connection unless already done.
    async fn ensure_subscribed(&self) {
        let Some(inbox) = self.bound() else {
            return;
        };
        let epoch = self.client.epoch();

        let subscription = {
            let mut active = self.active_slot();
            if active
                .as_ref()
                .is_some_and(|a| a.epoch == epoch && a.inbox == inbox)
            {
                return;
            }
            let subscription = ActiveSubscription {
                id: format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
                destination: self.destination_for(inbox),
                inbox,
                epoch,
            };
            *active = Some(subscription.clone());
            subscription
        };

        match self
            .client
            .send(StompFrame::subscribe(&subscription.id, &subscription.destination))
            .await
        {
            Ok(()) => info!(
                inbox = %inbox,
                id = %subscription.id,
                destination = %subscription.destination,
                "Subscribed to notification topic"
            ),
            Err(e) => {
                warn!(inbox = %inbox, error = %e, "SUBSCRIBE not sent; will retry on next connect");
                let mut active = self.active_slot();
                if active.as_ref() == Some(&subscription) {
                    *active = None;
                }
            }
        }
    }

    /// Decode one inbound frame and ingest it. Malformed or foreign frames
    /// are dropped without affecting later frames.
    pub fn handle_frame(&self, frame: StompFrame) {
        if frame.command != StompCommand::Message {
            return;
        }
        let Some(store) = self.binding().clone() else {
            self.drop_frame("no inbox bound");
            return;
        };
        let Some(active) = self.active() else {
            self.drop_frame("no active subscription");
            return;
        };

        let matches = match frame.get("subscription") {
            Some(id) => id == active.id,
            None => frame.get("destination") == Some(active.destination.as_str()),
        };
        if !matches {
            self.drop_frame("stale subscription");
            return;
        }

        match NotificationRecord::from_json(&frame.body) {
            Ok(record) if record.inbox() == store.inbox() => store.ingest_push(record),
            Ok(record) => {
                SyncMetrics::inc(&self.metrics.frames_dropped);
                warn!(
                    inbox = %store.inbox(),
                    record_inbox = %record.inbox(),
                    id = %record.id,
                    "Dropping notification addressed to another inbox"
                );
            }
            Err(e) => {
                SyncMetrics::inc(&self.metrics.frames_dropped);
                warn!(
                    inbox = %store.inbox(),
                    error = %e,
                    body_len = frame.body.len(),
                    "Dropping malformed notification frame"
                );
            }
        }
    }

    fn drop_frame(&self, reason: &'static str) {
        SyncMetrics::inc(&self.metrics.frames_dropped);
        debug!(reason, "Dropping MESSAGE frame");
    }

    /// Spawn the task that follows connection state and ingests frames.
    pub fn run(
        self: &Arc<Self>,
        mut frames: mpsc::Receiver<StompFrame>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut states = this.client.state_changes();
            let initial = *states.borrow_and_update();
            this.on_state(initial).await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        this.on_state(state).await;
                    }
                    frame = frames.recv() => match frame {
                        Some(frame) => this.handle_frame(frame),
                        None => break,
                    },
                }
            }
            debug!("Subscription task exited");
        })
    }
}
