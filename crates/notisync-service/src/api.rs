//! REST contract consumed by the synchronization services.
//!
//! The backend owns notification storage; this trait only names the calls
//! the client issues. Implementations apply no timeouts of their own beyond
//! transport defaults; callers bound every call.

use async_trait::async_trait;

use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;

/// Notification endpoints of the backend.
#[async_trait]
pub trait NotificationApi: Send + Sync + 'static {
    /// `GET /notifications/{userType}/{userId}/unread`
    async fn unread(&self, inbox: InboxId) -> AppResult<Vec<NotificationRecord>>;

    /// `GET /notifications/{userType}/{userId}/unread-count`
    async fn unread_count(&self, inbox: InboxId) -> AppResult<u64>;

    /// `PATCH /notifications/{id}/read`
    async fn mark_read(&self, id: NotificationId) -> AppResult<()>;

    /// `PATCH /notifications/{userType}/{userId}/read-all`
    async fn mark_all_read(&self, inbox: InboxId) -> AppResult<()>;

    /// `DELETE /notifications/{id}`
    async fn delete(&self, id: NotificationId) -> AppResult<()>;
}
