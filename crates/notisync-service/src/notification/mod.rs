//! Notification state, polling, and read-state coordination.

pub mod polling;
pub mod reads;
pub mod snapshot;
pub mod store;
