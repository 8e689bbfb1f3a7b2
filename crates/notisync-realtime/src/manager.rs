//! Mount/unmount bookkeeping for the single active session.
//!
//! Several views may show the same inbox at once; they share one session.
//! The session is torn down when the last view unmounts, or replaced when
//! a view mounts a different inbox (identity switch).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use notisync_core::config::AppConfig;
use notisync_core::events::InboxEvents;
use notisync_core::types::InboxId;
use notisync_service::NotificationApi;

use crate::session::NotificationSession;
use crate::transport::PushTransport;

struct Mounted {
    session: Arc<NotificationSession>,
    mounts: usize,
}

/// Owns at most one [`NotificationSession`] at a time.
pub struct SessionManager {
    config: AppConfig,
    api: Arc<dyn NotificationApi>,
    transport: Arc<dyn PushTransport>,
    events: InboxEvents,
    current: Mutex<Option<Mounted>>,
}

impl SessionManager {
    /// Create a manager with no session.
    pub fn new(
        config: AppConfig,
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn PushTransport>,
        events: InboxEvents,
    ) -> Self {
        Self {
            config,
            api,
            transport,
            events,
            current: Mutex::new(None),
        }
    }

    /// Event bus shared by every session this manager creates.
    pub fn events(&self) -> &InboxEvents {
        &self.events
    }

    /// Attach a view to `inbox`, starting or switching the session as needed.
    pub async fn mount(&self, inbox: InboxId) -> Arc<NotificationSession> {
        let mut current = self.current.lock().await;

        if let Some(mounted) = current.as_mut() {
            if mounted.session.inbox() == inbox {
                mounted.mounts += 1;
                debug!(inbox = %inbox, mounts = mounted.mounts, "Inbox mounted again");
                return mounted.session.clone();
            }
        }

        if let Some(previous) = current.take() {
            info!(
                from = %previous.session.inbox(),
                to = %inbox,
                "Identity switch; replacing notification session"
            );
            previous.session.teardown().await;
        }

        let session = NotificationSession::init(
            inbox,
            &self.config,
            self.api.clone(),
            self.transport.clone(),
            self.events.clone(),
        )
        .await;
        *current = Some(Mounted {
            session: session.clone(),
            mounts: 1,
        });
        session
    }

    /// Detach one view from `inbox`. Returns `true` when this tore the
    /// session down.
    pub async fn unmount(&self, inbox: InboxId) -> bool {
        let mut current = self.current.lock().await;
        let Some(mounted) = current.as_mut() else {
            return false;
        };
        if mounted.session.inbox() != inbox {
            debug!(inbox = %inbox, "Unmount for an inbox that is not mounted");
            return false;
        }

        mounted.mounts = mounted.mounts.saturating_sub(1);
        if mounted.mounts > 0 {
            return false;
        }
        if let Some(last) = current.take() {
            last.session.teardown().await;
        }
        true
    }

    /// The live session, if any.
    pub async fn current(&self) -> Option<Arc<NotificationSession>> {
        self.current.lock().await.as_ref().map(|m| m.session.clone())
    }

    /// Number of views attached to the live session.
    pub async fn mounts(&self) -> usize {
        self.current.lock().await.as_ref().map_or(0, |m| m.mounts)
    }

    /// Tear down the live session regardless of mount count.
    pub async fn shutdown(&self) {
        if let Some(mounted) = self.current.lock().await.take() {
            mounted.session.teardown().await;
        }
    }
}
