//! Synchronization metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Session-level metrics counters.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Push frames received on the notification subscription
    pub frames_received: AtomicU64,
    /// Push frames dropped as undecodable or foreign
    pub frames_dropped: AtomicU64,
    /// Records accepted through the push path
    pub pushes_ingested: AtomicU64,
    /// Reconnect attempts scheduled
    pub reconnects: AtomicU64,
    /// Polls applied to the store
    pub polls_ok: AtomicU64,
    /// Polls that failed or timed out
    pub polls_failed: AtomicU64,
    /// Read acknowledgements accepted by the backend
    pub acks_ok: AtomicU64,
    /// Read acknowledgements that failed or timed out
    pub acks_failed: AtomicU64,
}

impl SyncMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            pushes_ingested: self.pushes_ingested.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            polls_ok: self.polls_ok.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            acks_ok: self.acks_ok.load(Ordering::Relaxed),
            acks_failed: self.acks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Push frames received
    pub frames_received: u64,
    /// Push frames dropped
    pub frames_dropped: u64,
    /// Records accepted through the push path
    pub pushes_ingested: u64,
    /// Reconnect attempts scheduled
    pub reconnects: u64,
    /// Polls applied
    pub polls_ok: u64,
    /// Polls failed
    pub polls_failed: u64,
    /// Acknowledgements accepted
    pub acks_ok: u64,
    /// Acknowledgements failed
    pub acks_failed: u64,
}
