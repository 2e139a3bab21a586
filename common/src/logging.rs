//! Logging setup and the driver log sink.
//!
//! Database drivers emit their own log lines (sqlx logs statements under
//! `sqlx::*` targets). [`OrmLogLayer`] picks those events up and hands them to
//! a [`LogSink`], which decides where they end up. [`TracingSink`] routes them
//! back into the host's structured log with a normalized severity.

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, FilterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target prefixes treated as driver output.
const ORM_TARGETS: [&str; 1] = ["sqlx"];

/// Target used when driver lines are re-emitted.
pub const ORM_LOG_TARGET: &str = "orm";

/// Severity of a forwarded driver log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        if level == Level::WARN {
            Severity::Warn
        } else if level == Level::ERROR {
            Severity::Error
        } else {
            // TRACE, DEBUG, INFO
            Severity::Info
        }
    }
}

/// Receives log lines produced by the database layer.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, severity: Severity, target: &str, message: &str);
}

impl<T: LogSink + ?Sized> LogSink for std::sync::Arc<T> {
    fn log(&self, severity: Severity, target: &str, message: &str) {
        (**self).log(severity, target, message)
    }
}

/// Forwards driver log lines to `tracing` under [`ORM_LOG_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, target: &str, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: ORM_LOG_TARGET, source = target, "{message}"),
            Severity::Warn => tracing::warn!(target: ORM_LOG_TARGET, source = target, "{message}"),
            Severity::Error => {
                tracing::error!(target: ORM_LOG_TARGET, source = target, "{message}")
            }
        }
    }
}

/// Returns true for targets emitted by the database drivers.
pub fn is_orm_target(target: &str) -> bool {
    ORM_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

/// Layer that forwards driver events to a [`LogSink`].
pub struct OrmLogLayer<S> {
    sink: S,
}

impl<S: LogSink> OrmLogLayer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S, Sub> Layer<Sub> for OrmLogLayer<S>
where
    S: LogSink,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let meta = event.metadata();
        if !is_orm_target(meta.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink
            .log(Severity::from(*meta.level()), meta.target(), &visitor.finish());
    }
}

/// Flattens an event into `message k=v k=v`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

/// Installs the global tracing subscriber, writing to stdout.
///
/// `RUST_LOG` is read here, so load `.env` first.
pub fn init_tracing<S: LogSink>(sink: Option<S>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    build_subscriber(sink, env_filter, std::io::stdout, true).init();
}

/// Builds the subscriber used by [`init_tracing`] around any writer.
///
/// The fmt layer honours `env_filter` and skips driver targets; with a sink,
/// driver events go through [`OrmLogLayer`] instead, so each driver line is
/// written once.
pub fn build_subscriber<S, W>(
    sink: Option<S>,
    env_filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> impl Subscriber + Send + Sync + 'static
where
    S: LogSink,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_filter(env_filter.and(filter_fn(|meta| !is_orm_target(meta.target()))));
    let orm_layer = sink.map(|sink| {
        OrmLogLayer::new(sink).with_filter(filter_fn(|meta| is_orm_target(meta.target())))
    });

    tracing_subscriber::registry().with(fmt_layer).with(orm_layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(Severity, String, String)>>,
    }

    impl LogSink for RecordingSink {
        fn log(&self, severity: Severity, target: &str, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push((severity, target.to_string(), message.to_string()));
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::from(Level::TRACE), Severity::Info);
        assert_eq!(Severity::from(Level::DEBUG), Severity::Info);
        assert_eq!(Severity::from(Level::INFO), Severity::Info);
        assert_eq!(Severity::from(Level::WARN), Severity::Warn);
        assert_eq!(Severity::from(Level::ERROR), Severity::Error);
    }

    #[test]
    fn test_orm_targets() {
        assert!(is_orm_target("sqlx::query"));
        assert!(is_orm_target("sqlx"));
        assert!(!is_orm_target("connection_factory"));
        assert!(!is_orm_target(ORM_LOG_TARGET));
    }

    #[test]
    fn test_layer_forwards_driver_events_only() {
        let sink = Arc::new(RecordingSink::default());
        let subscriber = tracing_subscriber::registry().with(OrmLogLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "sqlx::query", rows_affected = 3, "SELECT 1");
            tracing::warn!(target: "sqlx::query", "slow statement");
            tracing::error!(target: "sqlx::pool", "pool timed out");
            tracing::info!(target: "app", "not a driver line");
        });

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            (
                Severity::Info,
                "sqlx::query".to_string(),
                "SELECT 1 rows_affected=3".to_string()
            )
        );
        assert_eq!(lines[1].0, Severity::Warn);
        assert_eq!(lines[1].2, "slow statement");
        assert_eq!(lines[2].0, Severity::Error);
        assert_eq!(lines[2].1, "sqlx::pool");
    }

    #[test]
    fn test_message_visitor_without_message() {
        let mut visitor = MessageVisitor::default();
        visitor.push_field("elapsed", format_args!("{:?}", "2ms"));
        assert_eq!(visitor.finish(), "elapsed=\"2ms\"");
    }
}
