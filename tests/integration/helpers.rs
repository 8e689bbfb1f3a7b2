//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::events::InboxEvents;
use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId, UserId, UserType};
use notisync_entity::{NotificationRecord, NotificationType};
use notisync_realtime::{MemoryPeer, MemoryTransport, NotificationSession, SessionManager};
use notisync_service::NotificationApi;

/// Inbox used by most tests.
pub fn alice() -> InboxId {
    InboxId::new(21, UserType::Individual)
}

/// A record for `inbox` created `minute` minutes after a fixed epoch.
pub fn record(inbox: InboxId, id: i64, is_read: bool, minute: i64) -> NotificationRecord {
    NotificationRecord {
        id: NotificationId(id),
        user_id: UserId(inbox.user_id.get()),
        user_type: inbox.user_type,
        kind: NotificationType::InterviewOffer,
        title: format!("Interview offer {id}"),
        content: "A company would like to talk".to_string(),
        is_read,
        related_id: Some(500 + id),
        related_type: Some("INTERVIEW".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
            + chrono::Duration::minutes(minute),
    }
}

/// JSON push payload for `record`.
pub fn push_body(record: &NotificationRecord) -> String {
    serde_json::to_string(record).expect("record serializes")
}

#[derive(Default)]
struct BackendState {
    records: Vec<NotificationRecord>,
    fail_reads: bool,
    fail_acks: bool,
    calls: Vec<String>,
}

/// In-memory backend implementing the REST contract.
#[derive(Default)]
pub struct Backend {
    state: Mutex<BackendState>,
}

impl Backend {
    /// Replace the server-side records.
    pub fn set_records(&self, records: Vec<NotificationRecord>) {
        self.state.lock().unwrap().records = records;
    }

    /// Add one server-side record.
    pub fn insert(&self, record: NotificationRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    /// Make list and count requests fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Make read, read-all, and delete requests fail.
    pub fn fail_acks(&self, fail: bool) {
        self.state.lock().unwrap().fail_acks = fail;
    }

    /// Server-side read flag of `id`.
    pub fn is_read(&self, id: i64) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == NotificationId(id))
            .map(|r| r.is_read)
    }

    /// Number of calls whose name starts with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn enter(&self, call: String, ack: bool) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        let failing = if ack { state.fail_acks } else { state.fail_reads };
        if failing {
            return Err(AppError::external_service("backend returned 503"));
        }
        Ok(())
    }

    fn unread_of(&self, inbox: InboxId) -> Vec<NotificationRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.inbox() == inbox && r.is_unread())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationApi for Backend {
    async fn unread(&self, inbox: InboxId) -> AppResult<Vec<NotificationRecord>> {
        self.enter(format!("unread {inbox}"), false)?;
        Ok(self.unread_of(inbox))
    }

    async fn unread_count(&self, inbox: InboxId) -> AppResult<u64> {
        self.enter(format!("count {inbox}"), false)?;
        Ok(self.unread_of(inbox).len() as u64)
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        self.enter(format!("mark_read {id}"), true)?;
        let mut state = self.state.lock().unwrap();
        for record in state.records.iter_mut().filter(|r| r.id == id) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, inbox: InboxId) -> AppResult<()> {
        self.enter(format!("mark_all_read {inbox}"), true)?;
        let mut state = self.state.lock().unwrap();
        for record in state.records.iter_mut().filter(|r| r.inbox() == inbox) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> AppResult<()> {
        self.enter(format!("delete {id}"), true)?;
        self.state.lock().unwrap().records.retain(|r| r.id != id);
        Ok(())
    }
}

/// Configuration tuned for deterministic paused-clock tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::from_toml_str(
        r#"
        [realtime]
        endpoint = "ws://memory.test/ws"
        heartbeat_outgoing_ms = 0
        heartbeat_incoming_ms = 0
        max_reconnect_attempts = 3
        reconnect_base_delay_ms = 500
        reconnect_max_delay_ms = 4000

        [polling]
        interval_seconds = 30
        request_timeout_ms = 2000

        [api]
        request_timeout_ms = 2000
        "#,
    )
    .expect("test config parses");
    config.api.auth_token = Some("test-token".to_string());
    config
}

/// A backend, an in-memory push server, and a session manager.
pub struct TestApp {
    /// REST backend
    pub backend: Arc<Backend>,
    /// Push server
    pub transport: MemoryTransport,
    /// Shared event bus
    pub events: InboxEvents,
    /// Session manager under test
    pub manager: SessionManager,
}

impl TestApp {
    /// Create a test application with the default test config.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a test application with `config`.
    pub fn with_config(config: AppConfig) -> Self {
        let backend = Arc::new(Backend::default());
        let transport = MemoryTransport::new();
        let events = InboxEvents::default();
        let manager = SessionManager::new(
            config,
            backend.clone(),
            Arc::new(transport.clone()),
            events.clone(),
        );
        Self {
            backend,
            transport,
            events,
            manager,
        }
    }

    /// Mount `inbox` and let the session settle.
    pub async fn mount(&self, inbox: InboxId) -> Arc<NotificationSession> {
        let session = self.manager.mount(inbox).await;
        settle().await;
        session
    }

    /// Push `record` to `session` over its live subscription.
    pub async fn push(&self, session: &NotificationSession, record: &NotificationRecord) {
        let peer = self.live_peer().await;
        let sub_id = session
            .subscriptions()
            .active()
            .expect("session has an active subscription")
            .id;
        peer.message(&sub_id, push_body(record));
        settle().await;
    }

    /// Server side of the latest accepted connection.
    pub async fn live_peer(&self) -> MemoryPeer {
        let accepted = self.transport.accepted();
        assert!(accepted > 0, "no connection accepted yet");
        self.transport.peer(accepted - 1).await
    }
}

/// Let spawned tasks run on the paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
