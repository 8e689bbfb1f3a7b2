//! Notification state store: the single source of truth for one inbox.
//!
//! Every mutation funnels through four entry points (`ingest_push`,
//! `ingest_poll_result`, `mark_read`, `mark_all_read`) with deterministic
//! merge rules:
//!
//! - records are upserted by id
//! - `is_read` never goes from `true` back to `false`
//! - a fresh poll that omits a locally-unread record marks it read
//! - the unread count is always derived from the records, never stored
//!
//! Mutations are serialized. After each mutation that changed state, every
//! listener is called synchronously, in mutation order, with the same
//! [`StoreSnapshot`]. Listeners may read the store from inside the callback
//! and observe exactly the snapshot's values, but must not mutate it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, trace, warn};

use notisync_core::config::store::StoreConfig;
use notisync_core::events::{InboxEvent, InboxEvents};
use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;

use super::snapshot::{PollMerge, PollTicket, StoreSnapshot};
use crate::metrics::SyncMetrics;

/// Callback invoked after every state-changing mutation.
pub type Listener = Arc<dyn Fn(&StoreSnapshot) + Send + Sync>;

/// Callback invoked for each previously-unknown unread record.
pub type ArrivalHook = Arc<dyn Fn(&NotificationRecord) + Send + Sync>;

/// Handle returned by [`NotificationStateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Result of a local `mark_read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The record was unread and is now read.
    Marked,
    /// The record was already read; nothing changed.
    AlreadyRead,
    /// The id is not tracked; it is remembered as read so a lagging poll
    /// cannot introduce it as unread.
    Unknown,
}

/// A tracked record plus the store sequences at which it was last seen and
/// became read.
#[derive(Debug, Clone)]
struct Tracked {
    record: NotificationRecord,
    seen_seq: u64,
    read_seq: Option<u64>,
    /// A poll issued after the read no longer lists the id as unread.
    confirmed: bool,
}

impl Tracked {
    fn new(record: NotificationRecord, seq: u64) -> Self {
        let read_seq = record.is_read.then_some(seq);
        Self {
            record,
            seen_seq: seq,
            read_seq,
            confirmed: false,
        }
    }

    /// Flip to read. Returns `false` if the record was already read.
    fn set_read(&mut self, seq: u64) -> bool {
        if self.record.is_read {
            return false;
        }
        self.record.is_read = true;
        self.read_seq = Some(seq);
        true
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<NotificationId, Tracked>,
    /// Read records in the order they became read.
    read_order: VecDeque<NotificationId>,
    /// Ids marked read before any record for them arrived, oldest first.
    bare_reads: VecDeque<NotificationId>,
    bare_read_set: HashSet<NotificationId>,
    /// Bumped on every mutation call.
    seq: u64,
    /// Bumped on every mutation that changed state.
    version: u64,
}

/// What a single mutation did, collected under the state lock.
#[derive(Debug, Default)]
struct Applied {
    changed: bool,
    arrivals: Vec<NotificationRecord>,
}

enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

impl StoreState {
    fn unread_count(&self) -> usize {
        self.records
            .values()
            .filter(|t| t.record.is_unread())
            .count()
    }

    fn unread_list(&self) -> Vec<NotificationRecord> {
        let mut unread: Vec<NotificationRecord> = self
            .records
            .values()
            .filter(|t| t.record.is_unread())
            .map(|t| t.record.clone())
            .collect();
        unread.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        unread
    }

    fn snapshot(&self, inbox: InboxId) -> StoreSnapshot {
        let unread = self.unread_list();
        StoreSnapshot {
            inbox,
            version: self.version,
            unread_count: unread.len(),
            unread,
        }
    }

    /// Upsert by id without ever downgrading `is_read`.
    fn upsert(&mut self, mut incoming: NotificationRecord) -> Upsert {
        let seq = self.seq;
        let id = incoming.id;
        if self.bare_read_set.remove(&id) {
            self.bare_reads.retain(|bare| *bare != id);
            incoming.is_read = true;
        }

        let (outcome, became_read) = match self.records.get_mut(&id) {
            None => {
                let read = incoming.is_read;
                self.records.insert(id, Tracked::new(incoming, seq));
                (Upsert::Inserted, read)
            }
            Some(tracked) => {
                tracked.seen_seq = seq;
                let was_read = tracked.record.is_read;
                if was_read {
                    incoming.is_read = true;
                }
                if tracked.record == incoming {
                    (Upsert::Unchanged, false)
                } else {
                    let became_read = !was_read && incoming.is_read;
                    if became_read {
                        tracked.read_seq = Some(seq);
                    }
                    tracked.record = incoming;
                    (Upsert::Updated, became_read)
                }
            }
        };
        if became_read {
            self.read_order.push_back(id);
        }
        outcome
    }

    /// Bound the read bookkeeping to `max` entries each.
    ///
    /// Bare read ids are forgotten oldest first. A read record is only
    /// forgotten once confirmed by the server, earliest read first; until
    /// then it stays so that a lagging poll cannot bring it back as unread.
    fn compact(&mut self, max: usize) {
        while self.bare_reads.len() > max {
            if let Some(id) = self.bare_reads.pop_front() {
                self.bare_read_set.remove(&id);
            }
        }

        if self.read_order.len() <= max {
            return;
        }
        let mut excess = self.read_order.len() - max;
        let records = &mut self.records;
        self.read_order.retain(|id| {
            if excess == 0 {
                return true;
            }
            match records.get(id).map(|tracked| tracked.confirmed) {
                Some(false) => true,
                Some(true) => {
                    records.remove(id);
                    excess -= 1;
                    false
                }
                None => {
                    excess -= 1;
                    false
                }
            }
        });
    }
}

/// Single mutable source of truth for one inbox's notifications.
pub struct NotificationStateStore {
    inbox: InboxId,
    config: StoreConfig,
    state: Mutex<StoreState>,
    /// Held across apply + notify so listeners see mutations strictly in order.
    delivery: Mutex<()>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    arrival_hooks: RwLock<Vec<ArrivalHook>>,
    next_listener: AtomicU64,
    events: InboxEvents,
    metrics: Arc<SyncMetrics>,
}

impl std::fmt::Debug for NotificationStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStateStore")
            .field("inbox", &self.inbox)
            .field("unread_count", &self.unread_count())
            .finish()
    }
}

impl NotificationStateStore {
    /// Create an empty store for `inbox`.
    pub fn new(
        inbox: InboxId,
        config: StoreConfig,
        events: InboxEvents,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            inbox,
            config,
            state: Mutex::new(StoreState::default()),
            delivery: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            arrival_hooks: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            events,
            metrics,
        }
    }

    /// Inbox served by this store.
    pub fn inbox(&self) -> InboxId {
        self.inbox
    }

    /// Event bus the store publishes `StateChanged` on.
    pub fn events(&self) -> &InboxEvents {
        &self.events
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Attach a passive listener.
    pub fn subscribe(&self, listener: impl Fn(&StoreSnapshot) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() < before
    }

    /// Register a hook called for each newly-arrived unread record, e.g. to
    /// raise a desktop notification. Hooks never influence merging.
    pub fn on_arrival(&self, hook: impl Fn(&NotificationRecord) + Send + Sync + 'static) {
        self.arrival_hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(hook));
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Number of unread records, derived from the working set.
    pub fn unread_count(&self) -> usize {
        self.state().unread_count()
    }

    /// Unread records, most recent first.
    pub fn unread_list(&self) -> Vec<NotificationRecord> {
        self.state().unread_list()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state().snapshot(self.inbox)
    }

    /// Read flag of a tracked id; `None` if the id is unknown.
    pub fn is_read(&self, id: NotificationId) -> Option<bool> {
        let state = self.state();
        match state.records.get(&id) {
            Some(tracked) => Some(tracked.record.is_read),
            None if state.bare_read_set.contains(&id) => Some(true),
            None => None,
        }
    }

    /// A tracked record by id.
    pub fn get(&self, id: NotificationId) -> Option<NotificationRecord> {
        self.state().records.get(&id).map(|t| t.record.clone())
    }

    /// Capture the store position before issuing a poll.
    pub fn poll_ticket(&self) -> PollTicket {
        PollTicket(self.state().seq)
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Upsert one record received over the push channel.
    ///
    /// Unknown ids are inserted; known ids have every field refreshed except
    /// that a locally-read record stays read. Records for another inbox are
    /// dropped.
    pub fn ingest_push(&self, record: NotificationRecord) {
        if record.inbox() != self.inbox {
            warn!(
                inbox = %self.inbox,
                record_inbox = %record.inbox(),
                id = %record.id,
                "Dropping pushed notification for a different inbox"
            );
            return;
        }

        SyncMetrics::inc(&self.metrics.pushes_ingested);
        self.mutate(|state| {
            let unread = record.is_unread();
            let id = record.id;
            let mut applied = Applied::default();
            match state.upsert(record) {
                Upsert::Inserted => {
                    applied.changed = true;
                    if unread {
                        if let Some(tracked) = state.records.get(&id) {
                            applied.arrivals.push(tracked.record.clone());
                        }
                    }
                    trace!(id = %id, "Pushed notification inserted");
                }
                Upsert::Updated => applied.changed = true,
                Upsert::Unchanged => {}
            }
            (applied, ())
        });
    }

    /// Merge a poll result without a ticket: every tracked record is
    /// eligible for the absence rule.
    pub fn ingest_poll_result(&self, records: Vec<NotificationRecord>) -> PollMerge {
        self.ingest_poll_result_since(records, PollTicket::LATEST)
    }

    /// Merge a poll of the unread endpoint issued at `ticket`.
    ///
    /// Each record is upserted by the push rule. Locally-unread records that
    /// the poll omits, and that were last seen at or before `ticket`, become
    /// read.
    pub fn ingest_poll_result_since(
        &self,
        records: Vec<NotificationRecord>,
        ticket: PollTicket,
    ) -> PollMerge {
        let inbox = self.inbox;
        self.mutate(move |state| {
            let mut merge = PollMerge::default();
            let mut applied = Applied::default();
            let mut present = HashSet::with_capacity(records.len());
            let mut listed_unread = HashSet::new();

            for record in records {
                if record.inbox() != inbox {
                    debug!(inbox = %inbox, id = %record.id, "Ignoring polled record for a different inbox");
                    continue;
                }
                let id = record.id;
                let server_unread = record.is_unread();
                if server_unread {
                    merge.server_unread += 1;
                    listed_unread.insert(id);
                }
                present.insert(id);

                let locally_read = state
                    .records
                    .get(&id)
                    .map(|t| t.record.is_read)
                    .unwrap_or_else(|| state.bare_read_set.contains(&id));
                if locally_read && server_unread {
                    merge.stale_local_reads.push(id);
                }

                match state.upsert(record) {
                    Upsert::Inserted => {
                        applied.changed = true;
                        merge.inserted.push(id);
                        if let Some(tracked) = state.records.get(&id) {
                            if tracked.record.is_unread() {
                                applied.arrivals.push(tracked.record.clone());
                            }
                        }
                    }
                    Upsert::Updated => applied.changed = true,
                    Upsert::Unchanged => {}
                }
            }

            let seq = state.seq;
            for tracked in state.records.values_mut() {
                let id = tracked.record.id;
                if tracked.record.is_unread() {
                    if tracked.seen_seq <= ticket.0 && !present.contains(&id) {
                        tracked.set_read(seq);
                        tracked.confirmed = true;
                        merge.reconciled_read.push(id);
                        applied.changed = true;
                    }
                } else if !tracked.confirmed
                    && tracked.read_seq.is_some_and(|read| read <= ticket.0)
                    && !listed_unread.contains(&id)
                {
                    tracked.confirmed = true;
                }
            }
            merge.reconciled_read.sort();
            state
                .read_order
                .extend(merge.reconciled_read.iter().copied());

            if !merge.reconciled_read.is_empty() {
                debug!(
                    inbox = %inbox,
                    ids = ?merge.reconciled_read,
                    "Poll reconciled locally-unread notifications to read"
                );
            }
            (applied, merge)
        })
    }

    /// Optimistically mark one record read. Idempotent.
    pub fn mark_read(&self, id: NotificationId) -> MarkOutcome {
        let max = self.config.max_read_tombstones;
        self.mutate(move |state| {
            let mut applied = Applied::default();
            let seq = state.seq;
            let outcome = match state.records.get_mut(&id) {
                Some(tracked) => {
                    if tracked.set_read(seq) {
                        applied.changed = true;
                        MarkOutcome::Marked
                    } else {
                        MarkOutcome::AlreadyRead
                    }
                }
                None if state.bare_read_set.contains(&id) => MarkOutcome::AlreadyRead,
                None => {
                    if max > 0 {
                        state.bare_reads.push_back(id);
                        state.bare_read_set.insert(id);
                    }
                    MarkOutcome::Unknown
                }
            };
            if outcome == MarkOutcome::Marked {
                state.read_order.push_back(id);
            }
            (applied, outcome)
        })
    }

    /// Optimistically mark every record read. Returns the ids that changed.
    pub fn mark_all_read(&self) -> Vec<NotificationId> {
        self.mutate(|state| {
            let mut applied = Applied::default();
            let seq = state.seq;
            let mut marked: Vec<NotificationId> = state
                .records
                .values_mut()
                .filter_map(|t| t.set_read(seq).then_some(t.record.id))
                .collect();
            marked.sort();
            state.read_order.extend(marked.iter().copied());
            applied.changed = !marked.is_empty();
            (applied, marked)
        })
    }

    /// Apply `f` under the state lock and, if it changed anything, notify
    /// listeners, arrival hooks, and the event bus before releasing the
    /// delivery lock.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> (Applied, R)) -> R {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());

        let (applied, result, snapshot) = {
            let mut state = self.state();
            state.seq += 1;
            let (applied, result) = f(&mut state);
            state.compact(self.config.max_read_tombstones);
            let snapshot = if applied.changed {
                state.version += 1;
                Some(state.snapshot(self.inbox))
            } else {
                None
            };
            (applied, result, snapshot)
        };

        if let Some(snapshot) = snapshot {
            let listeners: Vec<Listener> = self
                .listeners
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|(_, l)| l.clone())
                .collect();
            for listener in &listeners {
                listener(&snapshot);
            }

            if !applied.arrivals.is_empty() {
                let hooks: Vec<ArrivalHook> = self
                    .arrival_hooks
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                for record in &applied.arrivals {
                    for hook in &hooks {
                        hook(record);
                    }
                }
            }

            self.events.publish(InboxEvent::StateChanged {
                inbox: self.inbox,
                unread_count: snapshot.unread_count,
            });
        }

        result
    }
}
