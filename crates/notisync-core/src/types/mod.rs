//! Shared domain types: typed identifiers and inbox identity.

pub mod id;
pub mod inbox;

pub use id::{NotificationId, SessionId, UserId};
pub use inbox::{InboxId, UserType};
