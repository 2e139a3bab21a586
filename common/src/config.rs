//! Environment configuration.
//!
//! Settings come from process environment variables, optionally seeded from a
//! `.env` file in the working directory. Variables already present in the
//! environment take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::AppResult;
use crate::models::Backend;

/// Backend kind, e.g. `postgres`.
pub const ENV_SERVER_TYPE: &str = "DB_SERVER_TYPE";
/// Connection string / DSN handed to the driver.
pub const ENV_SERVER_ADDR: &str = "DB_SERVER_ADDR";
pub const ENV_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "DB_CONNECT_TIMEOUT_SECS";
pub const ENV_TELEMETRY: &str = "DB_TELEMETRY";
pub const ENV_SLOW_STATEMENT_MS: &str = "DB_SLOW_STATEMENT_MS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SLOW_STATEMENT_MS: u64 = 1000;

/// Database bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Raw backend kind as configured; matched case-insensitively.
    pub server_type: String,
    /// Address / DSN for the selected backend.
    pub server_addr: String,
    /// Upper bound for sqlx pool size.
    pub max_connections: u32,
    /// Time allowed for the single connect attempt.
    pub connect_timeout_secs: u64,
    /// Attach the tracing span and statement logging.
    pub telemetry: bool,
    /// Statements slower than this are logged at WARN.
    pub slow_statement_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_type: String::new(),
            server_addr: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            telemetry: true,
            slow_statement_ms: DEFAULT_SLOW_STATEMENT_MS,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Missing kind/address become empty strings, which the factory rejects
    /// or hands to the driver as-is. Unparseable numbers fall back to their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            server_type: lookup(ENV_SERVER_TYPE).unwrap_or_default(),
            server_addr: lookup(ENV_SERVER_ADDR).unwrap_or_default(),
            max_connections: parse_number(&lookup, ENV_MAX_CONNECTIONS)
                .unwrap_or(defaults.max_connections),
            connect_timeout_secs: parse_number(&lookup, ENV_CONNECT_TIMEOUT_SECS)
                .unwrap_or(defaults.connect_timeout_secs),
            telemetry: lookup(ENV_TELEMETRY)
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.telemetry),
            slow_statement_ms: parse_number(&lookup, ENV_SLOW_STATEMENT_MS)
                .unwrap_or(defaults.slow_statement_ms),
        }
    }

    /// Resolves the configured backend kind.
    pub fn backend(&self) -> AppResult<Backend> {
        self.server_type.parse()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn slow_statement_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_statement_ms)
    }
}

/// Outcome of loading a `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    Missing,
    Malformed(String),
}

impl DotenvStatus {
    fn from_result(result: dotenvy::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => DotenvStatus::Loaded(path),
            Err(e) if e.not_found() => DotenvStatus::Missing,
            Err(e) => DotenvStatus::Malformed(e.to_string()),
        }
    }

    /// Logs the outcome; call once a subscriber is installed.
    pub fn log(&self) {
        match self {
            DotenvStatus::Loaded(path) => {
                tracing::debug!(path = %path.display(), "Loaded .env file")
            }
            DotenvStatus::Missing => {}
            DotenvStatus::Malformed(error) => {
                tracing::warn!(error = %error, "Ignoring malformed .env file")
            }
        }
    }
}

/// Loads `.env` from the working directory (best-effort, no error if missing).
///
/// Nothing is logged here: this runs before logging is set up, since
/// `RUST_LOG` may itself come from the file.
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

/// Loads a specific env file.
pub fn load_dotenv_from(path: &Path) -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}
