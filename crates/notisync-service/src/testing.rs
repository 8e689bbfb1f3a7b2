//! In-memory test doubles shared by the service tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId, UserId, UserType};
use notisync_entity::{NotificationRecord, NotificationType};

use crate::api::NotificationApi;

/// A record for inbox `individual:7` created `minute` minutes after a fixed epoch.
pub(crate) fn record(id: i64, is_read: bool, minute: i64) -> NotificationRecord {
    NotificationRecord {
        id: NotificationId(id),
        user_id: UserId(7),
        user_type: UserType::Individual,
        kind: NotificationType::ApplicationStatus,
        title: format!("Notification {id}"),
        content: String::new(),
        is_read,
        related_id: None,
        related_type: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
            + chrono::Duration::minutes(minute),
    }
}

#[derive(Default)]
struct FakeState {
    unread: Vec<NotificationRecord>,
    fail_reads: bool,
    fail_acks: bool,
    delay: Option<Duration>,
    calls: Vec<&'static str>,
}

/// Scriptable [`NotificationApi`].
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub(crate) fn set_unread(&self, records: Vec<NotificationRecord>) {
        self.state.lock().unwrap().unread = records;
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub(crate) fn fail_acks(&self, fail: bool) {
        self.state.lock().unwrap().fail_acks = fail;
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn count_of(&self, call: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    /// Record the call and return (delay, fail_reads, fail_acks).
    fn enter(&self, call: &'static str) -> (Option<Duration>, bool, bool) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        (state.delay, state.fail_reads, state.fail_acks)
    }

    async fn wait(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn unread(&self, inbox: InboxId) -> AppResult<Vec<NotificationRecord>> {
        let (delay, fail, _) = self.enter("unread");
        Self::wait(delay).await;
        if fail {
            return Err(AppError::external_service("unread list unavailable"));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .unread
            .iter()
            .filter(|r| r.inbox() == inbox)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, inbox: InboxId) -> AppResult<u64> {
        let (delay, fail, _) = self.enter("unread_count");
        Self::wait(delay).await;
        if fail {
            return Err(AppError::external_service("unread count unavailable"));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .unread
            .iter()
            .filter(|r| r.inbox() == inbox && r.is_unread())
            .count() as u64)
    }

    async fn mark_read(&self, _id: NotificationId) -> AppResult<()> {
        let (delay, _, fail) = self.enter("mark_read");
        Self::wait(delay).await;
        if fail {
            return Err(AppError::external_service("mark read rejected"));
        }
        Ok(())
    }

    async fn mark_all_read(&self, _inbox: InboxId) -> AppResult<()> {
        let (delay, _, fail) = self.enter("mark_all_read");
        Self::wait(delay).await;
        if fail {
            return Err(AppError::external_service("mark all read rejected"));
        }
        Ok(())
    }

    async fn delete(&self, _id: NotificationId) -> AppResult<()> {
        let (delay, _, fail) = self.enter("delete");
        Self::wait(delay).await;
        if fail {
            return Err(AppError::external_service("delete rejected"));
        }
        Ok(())
    }
}
