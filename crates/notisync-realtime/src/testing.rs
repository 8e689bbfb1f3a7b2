//! Test doubles for the session tests.

use std::sync::Mutex;

use async_trait::async_trait;

use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;
use notisync_service::NotificationApi;

#[derive(Default)]
struct BackendState {
    records: Vec<NotificationRecord>,
    calls: Vec<String>,
    failing: bool,
}

/// Backend holding a fixed set of records.
#[derive(Default)]
pub(crate) struct StubBackend {
    state: Mutex<BackendState>,
}

impl StubBackend {
    pub(crate) fn with_records(records: Vec<NotificationRecord>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().records = records;
        backend
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub(crate) fn count_of(&self, call: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(call))
            .count()
    }

    fn enter(&self, call: String) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing {
            return Err(AppError::external_service("backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for StubBackend {
    async fn unread(&self, inbox: InboxId) -> AppResult<Vec<NotificationRecord>> {
        self.enter(format!("unread {inbox}"))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.inbox() == inbox && r.is_unread())
            .cloned()
            .collect())
    }

    async fn unread_count(&self, inbox: InboxId) -> AppResult<u64> {
        self.enter(format!("count {inbox}"))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.inbox() == inbox && r.is_unread())
            .count() as u64)
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        self.enter(format!("mark_read {id}"))?;
        let mut state = self.state.lock().unwrap();
        for record in state.records.iter_mut().filter(|r| r.id == id) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, inbox: InboxId) -> AppResult<()> {
        self.enter(format!("mark_all_read {inbox}"))?;
        let mut state = self.state.lock().unwrap();
        for record in state.records.iter_mut().filter(|r| r.inbox() == inbox) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> AppResult<()> {
        self.enter(format!("delete {id}"))?;
        self.state.lock().unwrap().records.retain(|r| r.id != id);
        Ok(())
    }
}
