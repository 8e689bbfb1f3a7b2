//! Connection state machine states.

use std::fmt;

/// Lifecycle of the push connection.
///
/// ```text
/// Disconnected -> Connecting -> Connected
///                     ^             | unexpected close / heartbeat timeout
///                     |             v
///                     +---- Reconnecting { attempt } -> Failed (attempts exhausted)
/// ```
///
/// `disconnect()` returns to `Disconnected` from any state. `Failed` is
/// terminal until `connect()` is called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection and none wanted.
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The STOMP session is live.
    Connected,
    /// Waiting before reconnect attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Gave up after exhausting reconnect attempts.
    Failed,
}

impl ConnectionState {
    /// Whether a connection is live or being worked on, so `connect()`
    /// must not start another.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
