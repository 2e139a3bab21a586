//! Connection factory.
//!
//! Resolves the configured backend, opens it through a [`Connector`] and
//! attaches telemetry. Failures are logged under the `connection_factory`
//! target (and to an injected [`LogSink`], if any) and returned to the
//! caller; nothing here terminates the process.

use std::sync::Arc;
use std::time::Duration;

use common::config::AppConfig;
use common::errors::AppResult;
use common::logging::{LogSink, Severity};
use common::Backend;
use tracing::Instrument;

use crate::pool_manager::{Connector, DatabasePool, DriverConnector};
use crate::telemetry::Telemetry;

const LOG_TARGET: &str = "connection_factory";

/// An open database together with its backend and telemetry.
#[derive(Debug, Clone)]
pub struct Database<P = DatabasePool> {
    backend: Backend,
    pool: P,
    telemetry: Option<Telemetry>,
}

impl<P> Database<P> {
    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn into_pool(self) -> P {
        self.pool
    }

    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }
}

impl Database<DatabasePool> {
    /// Round-trips a trivial query, inside the telemetry span when attached.
    pub async fn ping(&self) -> AppResult<Duration> {
        match &self.telemetry {
            Some(t) => self.pool.ping().instrument(t.span().clone()).await,
            None => self.pool.ping().await,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await
    }
}

/// Builds database handles from a backend kind and address.
pub struct ConnectionFactory<C = DriverConnector> {
    connector: C,
    sink: Option<Arc<dyn LogSink>>,
    telemetry: bool,
    slow_statement: Duration,
}

impl ConnectionFactory<DriverConnector> {
    /// Factory over the real drivers, tuned from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(DriverConnector::from_config(config))
            .with_telemetry(config.telemetry)
            .with_slow_statement_threshold(config.slow_statement_threshold())
    }
}

impl<C: Connector> ConnectionFactory<C> {
    pub fn new(connector: C) -> Self {
        let defaults = AppConfig::default();
        Self {
            connector,
            sink: None,
            telemetry: defaults.telemetry,
            slow_statement: defaults.slow_statement_threshold(),
        }
    }

    /// Also hands factory log lines to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = enabled;
        self
    }

    pub fn with_slow_statement_threshold(mut self, threshold: Duration) -> Self {
        self.slow_statement = threshold;
        self
    }

    /// Opens the database named by `config.server_type` at `config.server_addr`.
    pub async fn create(&self, config: &AppConfig) -> AppResult<Database<C::Pool>> {
        self.open(&config.server_type, &config.server_addr).await
    }

    /// Opens `addr` with the backend named by `kind` (case-insensitive).
    ///
    /// One attempt only; the caller decides what a failure means for the
    /// process.
    pub async fn open(&self, kind: &str, addr: &str) -> AppResult<Database<C::Pool>> {
        let backend = kind.parse::<Backend>().inspect_err(|e| {
            tracing::error!(target: LOG_TARGET, code = e.code(), kind, "Unknown database type");
            self.report(Severity::Error, &e.to_string());
        })?;

        let telemetry = self
            .telemetry
            .then(|| Telemetry::new(backend, self.slow_statement));

        let connect = self.connector.connect(backend, addr, telemetry.as_ref());
        let result = match &telemetry {
            Some(t) => connect.instrument(t.span().clone()).await,
            None => connect.await,
        };

        let pool = result.inspect_err(|e| {
            tracing::error!(
                target: LOG_TARGET,
                code = e.code(),
                backend = %backend,
                error = %e,
                "Database connection failed"
            );
            self.report(Severity::Error, &format!("Database connection failed: {e}"));
        })?;

        tracing::info!(target: LOG_TARGET, backend = %backend, "Database connected");
        self.report(Severity::Info, &format!("Connected to {backend} database"));

        Ok(Database {
            backend,
            pool,
            telemetry,
        })
    }

    fn report(&self, severity: Severity, message: &str) {
        if let Some(sink) = &self.sink {
            sink.log(severity, LOG_TARGET, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::errors::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingSink {
        fn lines(&self) -> Vec<(Severity, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl LogSink for RecordingSink {
        fn log(&self, severity: Severity, _target: &str, message: &str) {
            self.lines.lock().unwrap().push((severity, message.to_string()));
        }
    }

    /// Echoes the resolved backend and address instead of connecting.
    struct EchoConnector;

    #[async_trait]
    impl Connector for EchoConnector {
        type Pool = (Backend, String, bool);

        async fn connect(
            &self,
            backend: Backend,
            addr: &str,
            telemetry: Option<&Telemetry>,
        ) -> AppResult<Self::Pool> {
            Ok((backend, addr.to_string(), telemetry.is_some()))
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Pool = ();

        async fn connect(
            &self,
            backend: Backend,
            _addr: &str,
            _telemetry: Option<&Telemetry>,
        ) -> AppResult<()> {
            Err(AppError::connection(backend, "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_selects_matching_backend_for_every_kind() {
        let factory = ConnectionFactory::new(EchoConnector);
        let cases = [
            ("sqlite", Backend::SQLite),
            ("Postgres", Backend::Postgres),
            ("MYSQL", Backend::MySQL),
            ("SqlServer", Backend::SqlServer),
            ("clickhouse", Backend::ClickHouse),
        ];

        for (kind, expected) in cases {
            let db = factory.open(kind, "dsn").await.unwrap();
            assert_eq!(db.backend(), expected);
            assert_eq!(db.pool(), &(expected, "dsn".to_string(), true));
            assert_eq!(db.telemetry().map(Telemetry::backend), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_unknown_kind_is_logged_and_returned() {
        let sink = Arc::new(RecordingSink::default());
        let factory = ConnectionFactory::new(EchoConnector).with_sink(sink.clone());

        let err = factory.open("Oracle", "dsn").await.unwrap_err();
        assert!(matches!(&err, AppError::UnsupportedDatabaseType(kind) if kind == "oracle"));

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Severity::Error);
        assert!(lines[0].1.contains("oracle"), "{}", lines[0].1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_logged_and_returned() {
        let sink = Arc::new(RecordingSink::default());
        let factory = ConnectionFactory::new(RefusingConnector).with_sink(sink.clone());

        let err = factory.open("mysql", "mysql://nowhere").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::DatabaseConnection { backend: Backend::MySQL, .. }
        ));

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Severity::Error);
        assert!(lines[0].1.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_telemetry_can_be_disabled() {
        let factory = ConnectionFactory::new(EchoConnector).with_telemetry(false);
        let db = factory.open("postgres", "dsn").await.unwrap();
        assert!(db.telemetry().is_none());
        assert!(!db.into_pool().2);
    }

    #[tokio::test]
    async fn test_create_reads_kind_and_address_from_config() {
        let sink = Arc::new(RecordingSink::default());
        let factory = ConnectionFactory::new(EchoConnector).with_sink(sink.clone());
        let config = AppConfig {
            server_type: "SQLite".into(),
            server_addr: "app.db".into(),
            ..AppConfig::default()
        };

        let db = factory.create(&config).await.unwrap();
        assert_eq!(db.pool().0, Backend::SQLite);
        assert_eq!(db.pool().1, "app.db");
        assert_eq!(sink.lines()[0].0, Severity::Info);
    }

    #[tokio::test]
    async fn test_sqlite_end_to_end() {
        let config = AppConfig {
            server_type: "sqlite".into(),
            server_addr: "sqlite::memory:".into(),
            max_connections: 1,
            ..AppConfig::default()
        };

        let db = ConnectionFactory::from_config(&config)
            .create(&config)
            .await
            .unwrap();
        assert_eq!(db.backend(), Backend::SQLite);
        db.ping().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_paginated_like_query_on_sqlite() {
        use common::utils::{build_like_filter, Paginate};
        use sqlx::{QueryBuilder, Row, Sqlite};

        let db = ConnectionFactory::new(DriverConnector::new(1, Duration::from_secs(5)))
            .with_telemetry(false)
            .open("sqlite", "sqlite::memory:")
            .await
            .unwrap();
        let DatabasePool::SQLite(pool) = db.pool() else {
            panic!("expected sqlite pool");
        };

        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(pool)
            .await
            .unwrap();
        for (id, name) in [(1, "anna"), (2, "bob"), (3, "joanna"), (4, "hannah"), (5, "anne")] {
            sqlx::query("INSERT INTO users (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(pool)
                .await
                .unwrap();
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT name FROM users WHERE name LIKE ");
        builder
            .push_bind(build_like_filter("an.*a"))
            .push(" ORDER BY id")
            .paginate(1, 3);

        let names: Vec<String> = builder
            .build()
            .fetch_all(pool)
            .await
            .unwrap()
            .iter()
            .map(|row| row.get("name"))
            .collect();
        // "%an%a%" matches anna, joanna, hannah; skip the first, take two
        assert_eq!(names, vec!["joanna", "hannah"]);
    }
}
