//! Cross-component inbox events.
//!
//! The store publishes [`InboxEvent::StateChanged`] after every read-state
//! mutation so components outside the direct listener chain can react, and
//! any component may publish [`InboxEvent::ResyncRequested`] to ask the
//! session for an immediate poll.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::InboxId;

/// Default capacity of the event bus.
const DEFAULT_CAPACITY: usize = 64;

/// An inbox-level event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboxEvent {
    /// Read state changed; carries the derived unread count after the change.
    StateChanged {
        /// Inbox the change applies to.
        inbox: InboxId,
        /// Unread count after the change.
        unread_count: usize,
    },
    /// A component asked for the inbox to be re-synced from the backend.
    ResyncRequested {
        /// Inbox to re-sync.
        inbox: InboxId,
    },
}

impl InboxEvent {
    /// The inbox this event refers to.
    pub fn inbox(&self) -> InboxId {
        match self {
            Self::StateChanged { inbox, .. } | Self::ResyncRequested { inbox } => *inbox,
        }
    }
}

/// Broadcast bus for [`InboxEvent`]s.
#[derive(Debug, Clone)]
pub struct InboxEvents {
    tx: broadcast::Sender<InboxEvent>,
}

impl InboxEvents {
    /// Create a bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: InboxEvent) {
        let _ = self.tx.send(event);
    }

    /// Ask for a re-sync of `inbox`.
    pub fn request_resync(&self, inbox: InboxId) {
        self.publish(InboxEvent::ResyncRequested { inbox });
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.tx.subscribe()
    }
}

impl Default for InboxEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserType;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = InboxEvents::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        let inbox = InboxId::new(1, UserType::Individual);

        bus.publish(InboxEvent::StateChanged {
            inbox,
            unread_count: 3,
        });

        let expected = InboxEvent::StateChanged {
            inbox,
            unread_count: 3,
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = InboxEvents::new(1);
        bus.request_resync(InboxId::new(9, UserType::Company));
    }
}
