//! Convenience result type alias for plugmenu.

use crate::error::AppError;

/// A specialized `Result` type for plugmenu operations.
pub type AppResult<T> = Result<T, AppError>;
