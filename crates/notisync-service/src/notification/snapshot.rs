//! Immutable views handed out by the store.

use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;

/// State of one inbox after a mutation, delivered to every listener.
///
/// `unread_count` always equals `unread.len()`; it is carried separately
/// only for convenience.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    /// Inbox the snapshot belongs to.
    pub inbox: InboxId,
    /// Monotonic version, bumped by every mutation that changed state.
    pub version: u64,
    /// Unread records, most recent first.
    pub unread: Vec<NotificationRecord>,
    /// Number of unread records.
    pub unread_count: usize,
}

/// Store position captured before a poll request is issued.
///
/// Records first seen or refreshed after the ticket are not cleared by the
/// poll's absence rule, since the poll response may predate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket(pub u64);

impl PollTicket {
    /// A ticket that treats every tracked record as eligible.
    pub const LATEST: PollTicket = PollTicket(u64::MAX);
}

/// What a poll ingestion changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollMerge {
    /// Ids the store did not know before.
    pub inserted: Vec<NotificationId>,
    /// Locally-unread ids the poll omitted, now treated as read.
    pub reconciled_read: Vec<NotificationId>,
    /// Ids the server still reports unread although they are read locally.
    pub stale_local_reads: Vec<NotificationId>,
    /// Number of unread records the server reported for this inbox.
    pub server_unread: usize,
}
