//! Read-state coordination.
//!
//! User read actions update the store first, so the unread count drops
//! immediately, then acknowledge to the backend. A failed acknowledgement
//! is logged and recorded but never rolled back locally; the next poll
//! reconciles, and re-acknowledges ids the server still reports unread.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;
use notisync_core::types::NotificationId;

use super::store::{MarkOutcome, NotificationStateStore};
use crate::api::NotificationApi;
use crate::metrics::SyncMetrics;

/// Settled entries are pruned once the ledger grows past this size.
const LEDGER_PRUNE_THRESHOLD: usize = 1_024;

/// Server-side status of a locally-read notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    /// Read locally; acknowledgement in flight.
    PendingAck,
    /// The backend accepted the acknowledgement.
    Acknowledged,
    /// The acknowledgement failed or timed out.
    Unacknowledged,
}

/// Applies read actions optimistically and acknowledges them best-effort.
pub struct ReadStateCoordinator {
    api: Arc<dyn NotificationApi>,
    store: Arc<NotificationStateStore>,
    timeout: Duration,
    metrics: Arc<SyncMetrics>,
    ledger: DashMap<NotificationId, AckState>,
}

impl ReadStateCoordinator {
    /// Create a coordinator bounding each acknowledgement by `timeout`.
    pub fn new(
        api: Arc<dyn NotificationApi>,
        store: Arc<NotificationStateStore>,
        timeout: Duration,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            api,
            store,
            timeout,
            metrics,
            ledger: DashMap::new(),
        }
    }

    /// Acknowledgement status of `id`, if it was ever marked through here.
    pub fn ack_state(&self, id: NotificationId) -> Option<AckState> {
        self.ledger.get(&id).map(|s| *s)
    }

    /// Ids whose acknowledgement failed and has not been retried successfully.
    pub fn unacknowledged(&self) -> Vec<NotificationId> {
        let mut ids: Vec<NotificationId> = self
            .ledger
            .iter()
            .filter(|e| *e.value() == AckState::Unacknowledged)
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }

    /// Mark one notification read.
    ///
    /// The store is updated before this returns control to the backend call.
    /// An id that was already read locally is not acknowledged again.
    pub async fn mark_read(&self, id: NotificationId) -> MarkOutcome {
        let outcome = self.store.mark_read(id);
        match outcome {
            MarkOutcome::AlreadyRead => {
                debug!(id = %id, "Notification already read; no acknowledgement sent");
            }
            MarkOutcome::Marked | MarkOutcome::Unknown => {
                self.acknowledge(id).await;
            }
        }
        outcome
    }

    /// Mark every notification in the inbox read.
    ///
    /// Issues exactly one bulk request. Returns the ids that were unread.
    pub async fn mark_all_read(&self) -> Vec<NotificationId> {
        let marked = self.store.mark_all_read();
        for id in &marked {
            self.ledger.insert(*id, AckState::PendingAck);
        }

        let inbox = self.store.inbox();
        let result = self
            .bounded(self.api.mark_all_read(inbox))
            .await
            .map_err(|e| ack_failure("Bulk read acknowledgement", e));
        let state = match result {
            Ok(()) => {
                SyncMetrics::inc(&self.metrics.acks_ok);
                info!(inbox = %inbox, count = marked.len(), "All notifications marked read");
                AckState::Acknowledged
            }
            Err(e) => {
                SyncMetrics::inc(&self.metrics.acks_failed);
                warn!(
                    inbox = %inbox,
                    error = %e,
                    "Bulk read acknowledgement failed; keeping local state"
                );
                AckState::Unacknowledged
            }
        };
        for id in &marked {
            self.ledger.insert(*id, state);
        }
        self.prune();
        marked
    }

    /// Delete a notification: mark it read locally, then ask the backend to
    /// delete it. A failed delete is reported to the caller but the local
    /// read state stays.
    pub async fn delete(&self, id: NotificationId) -> AppResult<()> {
        self.store.mark_read(id);
        match self.bounded(self.api.delete(id)).await {
            Ok(()) => {
                self.ledger.remove(&id);
                info!(id = %id, "Notification deleted");
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Notification delete failed");
                Err(e)
            }
        }
    }

    /// Settle the ledger against a successful poll.
    ///
    /// `still_unread` holds the locally-read ids the server listed as unread.
    /// Failed entries the server no longer lists are forgotten. Listed ids
    /// whose acknowledgement failed, or that were never acknowledged through
    /// this coordinator, are acknowledged again; pending and acknowledged ids
    /// are left alone.
    pub async fn reconcile_acks(&self, still_unread: &[NotificationId]) {
        self.ledger.retain(|id, state| {
            *state != AckState::Unacknowledged || still_unread.contains(id)
        });

        for id in still_unread {
            let retry = match self.ack_state(*id) {
                Some(AckState::PendingAck) | Some(AckState::Acknowledged) => false,
                Some(AckState::Unacknowledged) | None => true,
            };
            if retry {
                debug!(id = %id, "Retrying read acknowledgement");
                self.acknowledge(*id).await;
            }
        }
    }

    async fn acknowledge(&self, id: NotificationId) {
        self.ledger.insert(id, AckState::PendingAck);
        let state = match self.send_ack(id).await {
            Ok(()) => {
                SyncMetrics::inc(&self.metrics.acks_ok);
                debug!(id = %id, "Read acknowledged");
                AckState::Acknowledged
            }
            Err(e) => {
                SyncMetrics::inc(&self.metrics.acks_failed);
                warn!(
                    id = %id,
                    error = %e,
                    "Read acknowledgement failed; keeping local state"
                );
                AckState::Unacknowledged
            }
        };
        self.ledger.insert(id, state);
        self.prune();
    }

    /// One bounded acknowledgement. Every failure surfaces as `AckFailure`.
    async fn send_ack(&self, id: NotificationId) -> AppResult<()> {
        self.bounded(self.api.mark_read(id))
            .await
            .map_err(|e| ack_failure("Read acknowledgement", e))
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Backend did not answer within {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    /// Drop settled entries once the ledger is large. Unacknowledged ids
    /// can go too: an id with no entry is retried when a poll lists it.
    fn prune(&self) {
        if self.ledger.len() > LEDGER_PRUNE_THRESHOLD {
            self.ledger.retain(|_, state| *state == AckState::PendingAck);
        }
    }
}

fn ack_failure(what: &str, cause: AppError) -> AppError {
    let message = format!("{what} failed: {}", cause.message);
    AppError::with_source(ErrorKind::AckFailure, message, cause)
}
