//! # notisync-http
//!
//! [`HttpNotificationApi`] implements the notification REST contract over
//! `reqwest`. Every request carries the configured timeout and, when a token
//! is configured, an `Authorization: Bearer` header.

pub mod client;

pub use client::HttpNotificationApi;
