pub mod types;

pub use types::{AppError, ExportError};

/// Convenience alias for results carrying an [`AppError`].
pub type AppResult<T> = Result<T, AppError>;
