//! Convenience result type alias for NotiSync.

use crate::error::AppError;

/// A specialized `Result` type for NotiSync operations.
pub type AppResult<T> = Result<T, AppError>;
