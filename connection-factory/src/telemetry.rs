//! Per-connection telemetry.
//!
//! A connection's work runs inside a `db` span tagged with the backend
//! (`db.system`), following OpenTelemetry database conventions. The same
//! settings switch sqlx statement logging on or off.

use std::time::Duration;

use common::Backend;
use log::LevelFilter;
use sqlx::ConnectOptions;
use tracing::Span;

/// Telemetry attached to an open database handle.
#[derive(Debug, Clone)]
pub struct Telemetry {
    backend: Backend,
    span: Span,
    slow_statement: Duration,
}

impl Telemetry {
    pub fn new(backend: Backend, slow_statement: Duration) -> Self {
        let span = tracing::info_span!(
            "db",
            db.system = backend.as_str(),
            otel.kind = "client",
        );
        Self {
            backend,
            span,
            slow_statement,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Span that database work for this handle should run under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn slow_statement(&self) -> Duration {
        self.slow_statement
    }
}

/// Applies statement logging to sqlx connect options.
///
/// With telemetry, every statement is logged at DEBUG and those slower than
/// the threshold at WARN. Without it, statement logging is off.
pub fn configure_statement_logging<O>(options: O, telemetry: Option<&Telemetry>) -> O
where
    O: ConnectOptions,
{
    match telemetry {
        Some(t) => options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, t.slow_statement()),
        None => options.disable_statement_logging(),
    }
}
