//! Database backend model.
//!
//! Maps configured backend names onto the fixed set of engines we can open.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Database backend enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite database (file or in-memory).
    SQLite,
    /// PostgreSQL database.
    Postgres,
    /// MySQL database.
    MySQL,
    /// Microsoft SQL Server.
    SqlServer,
    /// ClickHouse over its HTTP interface.
    ClickHouse,
}

impl Backend {
    /// Every supported backend, in configuration-name order.
    pub const ALL: [Backend; 5] = [
        Backend::SQLite,
        Backend::Postgres,
        Backend::MySQL,
        Backend::SqlServer,
        Backend::ClickHouse,
    ];

    /// Canonical lowercase name, as accepted in `DB_SERVER_TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::SQLite => "sqlite",
            Backend::Postgres => "postgres",
            Backend::MySQL => "mysql",
            Backend::SqlServer => "sqlserver",
            Backend::ClickHouse => "clickhouse",
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Backend::SQLite => None,
            Backend::Postgres => Some(5432),
            Backend::MySQL => Some(3306),
            Backend::SqlServer => Some(1433),
            Backend::ClickHouse => Some(8123),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = AppError;

    /// Case-insensitive; the error carries the lowercased input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = s.to_lowercase();
        match kind.as_str() {
            "sqlite" => Ok(Backend::SQLite),
            "postgres" => Ok(Backend::Postgres),
            "mysql" => Ok(Backend::MySQL),
            "sqlserver" => Ok(Backend::SqlServer),
            "clickhouse" => Ok(Backend::ClickHouse),
            _ => Err(AppError::UnsupportedDatabaseType(kind)),
        }
    }
}
