//! Shared building blocks for database bootstrap.
//!
//! - `config`: environment-driven settings
//! - `errors`: the startup error type
//! - `logging`: tracing setup and the driver log sink
//! - `models`: the supported backends
//! - `utils`: pagination and `LIKE` filter helpers

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod utils;

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use models::Backend;
