//! Polling refresher.
//!
//! Periodically, and on demand, fetches the unread list and count for one
//! inbox and merges them into the store. Every failure is swallowed: the
//! store keeps its prior contents, a warning is logged, and the next cycle
//! simply tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notisync_core::config::polling::PollingConfig;
use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;

use super::reads::ReadStateCoordinator;
use super::snapshot::PollMerge;
use super::store::NotificationStateStore;
use crate::api::NotificationApi;
use crate::metrics::SyncMetrics;

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The list was fetched and merged.
    Applied(PollMerge),
    /// Another refresh was already in flight; this one was coalesced into it.
    Skipped,
    /// The list request failed or timed out; the store is untouched.
    Failed(ErrorKind),
}

/// Fail-soft periodic refresher for one inbox.
pub struct PollingRefresher {
    api: Arc<dyn NotificationApi>,
    store: Arc<NotificationStateStore>,
    config: PollingConfig,
    metrics: Arc<SyncMetrics>,
    reads: Option<Arc<ReadStateCoordinator>>,
    in_flight: Mutex<()>,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
}

impl PollingRefresher {
    /// Create a stopped refresher.
    pub fn new(
        api: Arc<dyn NotificationApi>,
        store: Arc<NotificationStateStore>,
        config: PollingConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            api,
            store,
            config,
            metrics,
            reads: None,
            in_flight: Mutex::new(()),
            cancel: std::sync::Mutex::new(None),
        }
    }

    /// Settle `reads` after every successful poll: re-send acknowledgements
    /// the server has not applied and forget failures it has.
    pub fn with_ack_retry(mut self, reads: Arc<ReadStateCoordinator>) -> Self {
        self.reads = Some(reads);
        self
    }

    /// Whether the periodic timer is running.
    pub fn is_running(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Start the periodic timer. The first refresh runs immediately.
    ///
    /// Calling `start` while already running is a no-op and returns `None`.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let token = {
            let mut guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            if guard.as_ref().is_some_and(|t| !t.is_cancelled()) {
                return None;
            }
            let token = CancellationToken::new();
            *guard = Some(token.clone());
            token
        };

        let this = Arc::clone(self);
        let period = self.config.interval();
        info!(
            inbox = %self.store.inbox(),
            interval_secs = period.as_secs(),
            "Polling refresher started"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        this.refresh().await;
                    }
                }
            }
            debug!(inbox = %this.store.inbox(), "Polling refresher loop exited");
        }))
    }

    /// Stop the periodic timer. An in-flight request finishes but later
    /// ticks never run.
    pub fn stop(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
            info!(inbox = %self.store.inbox(), "Polling refresher stopped");
        }
    }

    /// Fetch the unread list and count once and merge them into the store.
    ///
    /// Concurrent calls coalesce: while one refresh is in flight, others
    /// return [`PollOutcome::Skipped`] without issuing requests.
    pub async fn refresh(&self) -> PollOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(inbox = %self.store.inbox(), "Refresh already in flight; skipping");
            return PollOutcome::Skipped;
        };

        let inbox = self.store.inbox();
        let timeout = self.config.request_timeout();
        let ticket = self.store.poll_ticket();

        let (list, count) = tokio::join!(
            bounded(timeout, self.api.unread(inbox)),
            bounded(timeout, self.api.unread_count(inbox)),
        );

        let records = match list {
            Ok(records) => records,
            Err(e) => {
                SyncMetrics::inc(&self.metrics.polls_failed);
                warn!(
                    inbox = %inbox,
                    error = %e,
                    "Unread list refresh failed; keeping current state"
                );
                return PollOutcome::Failed(e.kind);
            }
        };

        let merge = self.store.ingest_poll_result_since(records, ticket);
        SyncMetrics::inc(&self.metrics.polls_ok);

        match count {
            Ok(count) if count as usize != merge.server_unread => {
                debug!(
                    inbox = %inbox,
                    server_count = count,
                    listed = merge.server_unread,
                    "Server unread count differs from listed records"
                );
            }
            Ok(_) => {}
            Err(e) => {
                debug!(inbox = %inbox, error = %e, "Unread count refresh failed");
            }
        }

        if let Some(reads) = &self.reads {
            reads.reconcile_acks(&merge.stale_local_reads).await;
        }

        debug!(
            inbox = %inbox,
            inserted = merge.inserted.len(),
            reconciled = merge.reconciled_read.len(),
            unread = self.store.unread_count(),
            "Poll merged"
        );
        PollOutcome::Applied(merge)
    }
}

impl Drop for PollingRefresher {
    fn drop(&mut self) {
        if let Some(token) = self
            .cancel
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(format!(
            "Request did not complete within {}ms",
            limit.as_millis()
        ))),
    }
}
