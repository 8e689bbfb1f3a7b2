//! Notification entity and its type tag.

pub mod kind;
pub mod model;
pub mod timestamp;

pub use kind::NotificationType;
pub use model::NotificationRecord;
