//! Application error types.
//!
//! Startup either yields a usable database handle or one of these errors,
//! which the process entry point decides how to report.

use thiserror::Error;

use crate::models::Backend;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised while bringing up a database connection.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configured backend kind is not one we know how to open.
    #[error("unknown database type: {0:?}")]
    UnsupportedDatabaseType(String),

    /// The driver failed to establish (or verify) a connection.
    #[error("{backend} connection failed: {message}")]
    DatabaseConnection { backend: Backend, message: String },
}

impl AppError {
    /// Builds a connection error from any driver error.
    pub fn connection(backend: Backend, err: impl std::fmt::Display) -> Self {
        AppError::DatabaseConnection {
            backend,
            message: err.to_string(),
        }
    }

    /// Short machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE_TYPE",
            AppError::DatabaseConnection { .. } => "DATABASE_CONNECTION",
        }
    }
}
