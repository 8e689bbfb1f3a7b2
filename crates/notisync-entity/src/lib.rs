//! # notisync-entity
//!
//! Domain entity models for NotiSync: the notification record shared by the
//! push channel and the REST API.

pub mod notification;

pub use notification::{NotificationRecord, NotificationType};
