//! # notisync-core
//!
//! Core crate for NotiSync. Contains configuration schemas, typed
//! identifiers, the inbox event bus, and the unified error system.
//!
//! This crate has **no** internal dependencies on other NotiSync crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
