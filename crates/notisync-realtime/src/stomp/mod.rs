//! Minimal STOMP 1.2 support for the push channel.

pub mod codec;
pub mod frame;
pub mod heartbeat;

pub use codec::{decode, encode};
pub use frame::{Inbound, StompCommand, StompFrame};
pub use heartbeat::{HeartBeat, NegotiatedHeartBeat};
