//! # notisync-service
//!
//! Notification synchronization services for one inbox:
//!
//! - [`NotificationStateStore`]: single source of truth for the unread
//!   working set and its derived count
//! - [`PollingRefresher`]: periodic and on-demand REST refresh, fail-soft
//! - [`ReadStateCoordinator`]: optimistic read actions with best-effort
//!   acknowledgement
//! - [`NotificationApi`]: the REST contract these services consume

pub mod api;
pub mod metrics;
pub mod notification;

#[cfg(test)]
pub(crate) mod testing;

pub use api::NotificationApi;
pub use metrics::SyncMetrics;
pub use notification::polling::{PollOutcome, PollingRefresher};
pub use notification::reads::{AckState, ReadStateCoordinator};
pub use notification::snapshot::{PollMerge, PollTicket, StoreSnapshot};
pub use notification::store::{ListenerId, MarkOutcome, NotificationStateStore};
