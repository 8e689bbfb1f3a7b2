//! # notisync-realtime
//!
//! Push side of NotiSync: a STOMP 1.2 codec, pluggable transports, the
//! [`ReconnectingSocketClient`] finite-state machine, per-inbox topic
//! subscriptions, and the [`NotificationSession`] lifecycle tying them to
//! the store, refresher, and read coordinator.

pub mod channel;
pub mod connection;
pub mod manager;
pub mod session;
pub mod stomp;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ActiveSubscription, TopicSubscriptionManager};
pub use connection::{ConnectionState, ReconnectPolicy, ReconnectingSocketClient};
pub use manager::SessionManager;
pub use session::NotificationSession;
pub use transport::{
    ConnectBehavior, ConnectTarget, MemoryPeer, MemoryTransport, PushTransport,
    TungsteniteTransport,
};
