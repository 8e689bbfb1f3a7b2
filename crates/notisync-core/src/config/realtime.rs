//! Push channel (STOMP over WebSocket) configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Push channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether to open the push channel at all; polling still runs when disabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// WebSocket endpoint, e.g. `wss://api.example.com/ws`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Prefix prepended to the inbox topic to form the STOMP destination.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Upper bound for one handshake (socket + STOMP CONNECTED), in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Heart-beat interval the client offers to send, in milliseconds (0 = none).
    #[serde(default = "default_heartbeat")]
    pub heartbeat_outgoing_ms: u64,
    /// Heart-beat interval the client asks the server for, in milliseconds (0 = none).
    #[serde(default = "default_heartbeat")]
    pub heartbeat_incoming_ms: u64,
    /// Multiplier applied to the negotiated incoming interval before the
    /// connection is declared dead.
    #[serde(default = "default_grace_factor")]
    pub heartbeat_grace_factor: f64,
    /// Consecutive failed attempts tolerated before the client gives up.
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub reconnect_base_delay_ms: u64,
    /// Cap on the exponential reconnect delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// Buffer size of the inbound frame and outbound command channels.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer_size: usize,
    /// Largest accepted STOMP frame, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl RealtimeConfig {
    /// Handshake timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            topic_prefix: default_topic_prefix(),
            connect_timeout_ms: default_connect_timeout(),
            heartbeat_outgoing_ms: default_heartbeat(),
            heartbeat_incoming_ms: default_heartbeat(),
            heartbeat_grace_factor: default_grace_factor(),
            max_reconnect_attempts: default_max_attempts(),
            reconnect_base_delay_ms: default_base_delay(),
            reconnect_max_delay_ms: default_max_delay(),
            frame_buffer_size: default_frame_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_topic_prefix() -> String {
    "/topic/".to_string()
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_heartbeat() -> u64 {
    10_000
}

fn default_grace_factor() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_frame_buffer() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    65_536
}
