//! Driver connection pools.
//!
//! Opens the driver-level handle for each backend: sqlx pools for SQLite,
//! PostgreSQL and MySQL, a tiberius client for SQL Server and an HTTP client
//! for ClickHouse.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::Backend;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{MySqlPool, PgPool, SqlitePool};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use url::Url;

use crate::telemetry::{configure_statement_logging, Telemetry};

/// SQL Server client over a tokio TCP stream.
pub type SqlServerClient = tiberius::Client<Compat<TcpStream>>;

/// Open connection handle for any supported backend.
#[derive(Clone)]
pub enum DatabasePool {
    /// SQLite connection pool.
    SQLite(SqlitePool),
    /// PostgreSQL connection pool.
    Postgres(PgPool),
    /// MySQL connection pool.
    MySQL(MySqlPool),
    /// Single SQL Server connection, shared behind a lock.
    SqlServer(Arc<Mutex<SqlServerClient>>),
    /// ClickHouse HTTP client.
    ClickHouse(clickhouse::Client),
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DatabasePool").field(&self.backend()).finish()
    }
}

impl DatabasePool {
    pub fn backend(&self) -> Backend {
        match self {
            DatabasePool::SQLite(_) => Backend::SQLite,
            DatabasePool::Postgres(_) => Backend::Postgres,
            DatabasePool::MySQL(_) => Backend::MySQL,
            DatabasePool::SqlServer(_) => Backend::SqlServer,
            DatabasePool::ClickHouse(_) => Backend::ClickHouse,
        }
    }

    /// Runs a trivial query and returns the round-trip time.
    pub async fn ping(&self) -> AppResult<Duration> {
        let backend = self.backend();
        let start = Instant::now();

        match self {
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::connection(backend, e))?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::connection(backend, e))?;
            }
            DatabasePool::MySQL(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::connection(backend, e))?;
            }
            DatabasePool::SqlServer(client) => {
                let mut client = client.lock().await;
                client
                    .simple_query("SELECT 1")
                    .await
                    .map_err(|e| AppError::connection(backend, e))?
                    .into_results()
                    .await
                    .map_err(|e| AppError::connection(backend, e))?;
            }
            DatabasePool::ClickHouse(client) => {
                client
                    .query("SELECT 1")
                    .execute()
                    .await
                    .map_err(|e| AppError::connection(backend, e))?;
            }
        }

        Ok(start.elapsed())
    }

    /// Closes pooled connections. SQL Server and ClickHouse handles close on drop.
    pub async fn close(&self) {
        match self {
            DatabasePool::SQLite(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::MySQL(pool) => pool.close().await,
            DatabasePool::SqlServer(_) | DatabasePool::ClickHouse(_) => {}
        }
    }
}

/// Opens a driver handle for a resolved backend.
#[async_trait]
pub trait Connector: Send + Sync {
    type Pool: Send + Sync;

    async fn connect(
        &self,
        backend: Backend,
        addr: &str,
        telemetry: Option<&Telemetry>,
    ) -> AppResult<Self::Pool>;
}

/// Connector backed by the real drivers.
#[derive(Debug, Clone)]
pub struct DriverConnector {
    max_connections: u32,
    connect_timeout: Duration,
}

impl Default for DriverConnector {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl DriverConnector {
    pub fn new(max_connections: u32, connect_timeout: Duration) -> Self {
        Self {
            max_connections,
            connect_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_connections, config.connect_timeout())
    }

    async fn connect_sqlite(
        &self,
        addr: &str,
        telemetry: Option<&Telemetry>,
    ) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(addr)?.create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect_with(configure_statement_logging(options, telemetry))
            .await
    }

    async fn connect_postgres(
        &self,
        addr: &str,
        telemetry: Option<&Telemetry>,
    ) -> Result<PgPool, sqlx::Error> {
        let options = PgConnectOptions::from_str(addr)?;
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect_with(configure_statement_logging(options, telemetry))
            .await
    }

    async fn connect_mysql(
        &self,
        addr: &str,
        telemetry: Option<&Telemetry>,
    ) -> Result<MySqlPool, sqlx::Error> {
        let options = MySqlConnectOptions::from_str(addr)?;
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect_with(configure_statement_logging(options, telemetry))
            .await
    }

    async fn connect_sqlserver(&self, addr: &str) -> AppResult<SqlServerClient> {
        let err = |e: tiberius::error::Error| AppError::connection(Backend::SqlServer, e);
        let config = if addr.starts_with("jdbc:") {
            tiberius::Config::from_jdbc_string(addr).map_err(err)?
        } else {
            tiberius::Config::from_ado_string(addr).map_err(err)?
        };

        let handshake = async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| AppError::connection(Backend::SqlServer, e))?;
            tcp.set_nodelay(true)
                .map_err(|e| AppError::connection(Backend::SqlServer, e))?;
            tiberius::Client::connect(config, tcp.compat_write())
                .await
                .map_err(err)
        };

        tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                AppError::connection(
                    Backend::SqlServer,
                    format!("timed out after {:?}", self.connect_timeout),
                )
            })?
    }

    async fn connect_clickhouse(&self, addr: &str) -> AppResult<clickhouse::Client> {
        let target = ClickHouseTarget::parse(addr)?;
        let client = target.into_client();

        // The client is lazy; issue one query so bad addresses fail here.
        tokio::time::timeout(self.connect_timeout, client.query("SELECT 1").execute())
            .await
            .map_err(|_| {
                AppError::connection(
                    Backend::ClickHouse,
                    format!("timed out after {:?}", self.connect_timeout),
                )
            })?
            .map_err(|e| AppError::connection(Backend::ClickHouse, e))?;

        Ok(client)
    }
}

#[async_trait]
impl Connector for DriverConnector {
    type Pool = DatabasePool;

    async fn connect(
        &self,
        backend: Backend,
        addr: &str,
        telemetry: Option<&Telemetry>,
    ) -> AppResult<DatabasePool> {
        let err = |e: sqlx::Error| AppError::connection(backend, e);

        match backend {
            Backend::SQLite => self
                .connect_sqlite(addr, telemetry)
                .await
                .map(DatabasePool::SQLite)
                .map_err(err),
            Backend::Postgres => self
                .connect_postgres(addr, telemetry)
                .await
                .map(DatabasePool::Postgres)
                .map_err(err),
            Backend::MySQL => self
                .connect_mysql(addr, telemetry)
                .await
                .map(DatabasePool::MySQL)
                .map_err(err),
            Backend::SqlServer => {
                let client = self.connect_sqlserver(addr).await?;
                Ok(DatabasePool::SqlServer(Arc::new(Mutex::new(client))))
            }
            Backend::ClickHouse => self
                .connect_clickhouse(addr)
                .await
                .map(DatabasePool::ClickHouse),
        }
    }
}

// ============== ClickHouse address ==============

/// ClickHouse endpoint split into the pieces the HTTP client takes separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHouseTarget {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ClickHouseTarget {
    /// Parses `http(s)://` or `clickhouse://` addresses.
    ///
    /// Credentials and the first path segment move out of the URL; a missing
    /// port defaults to the HTTP interface port.
    pub fn parse(addr: &str) -> AppResult<Self> {
        let invalid = |reason: String| AppError::connection(Backend::ClickHouse, reason);

        let normalized = match addr.strip_prefix("clickhouse://") {
            Some(rest) => format!("http://{rest}"),
            None => addr.to_string(),
        };
        let mut url = Url::parse(&normalized).map_err(|e| invalid(format!("{e}: {addr:?}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }

        let user = Some(url.username().to_string()).filter(|u| !u.is_empty());
        let password = url.password().map(str::to_string);
        let database = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|db| !db.is_empty())
            .map(str::to_string);

        if url.port().is_none() && url.scheme() == "http" {
            let _ = url.set_port(Backend::ClickHouse.default_port());
        }
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.set_path("");
        url.set_query(None);

        Ok(Self {
            url: url.as_str().trim_end_matches('/').to_string(),
            user,
            password,
            database,
        })
    }

    pub fn into_client(self) -> clickhouse::Client {
        let mut client = clickhouse::Client::default().with_url(self.url);
        if let Some(user) = self.user {
            client = client.with_user(user);
        }
        if let Some(password) = self.password {
            client = client.with_password(password);
        }
        if let Some(database) = self.database {
            client = client.with_database(database);
        }
        client
    }
}
