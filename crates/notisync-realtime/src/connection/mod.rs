//! Push connection lifecycle.

pub mod backoff;
pub mod client;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use client::ReconnectingSocketClient;
pub use state::ConnectionState;
