//! # Logging
//!
//! `init_logging` installs one global `tracing` subscriber made of an
//! `EnvFilter`, a formatting layer on stderr and, when the host supplies a
//! [`LoggerSink`], a layer that mirrors each enabled event into it as a
//! [`LogEntry`].
//!
//! Credentials never reach the sink: fields named like keys or tokens, and
//! values that look like a bearer header, are replaced with `[REDACTED]`.
//!
//! ```ignore
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates raised to the configured level by the default filter.
const CLIPFEED_CRATES: &[&str] = &[
    "clipfeed_workspace",
    "core_runtime",
    "core_acquisition",
    "core_playback",
    "core_service",
    "bridge_desktop",
];

/// HTTP stack crates held at `warn`.
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per event
    Json,
    #[default]
    Compact,
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the clipfeed crates when no custom filter is set
    pub level: LogLevel,
    /// `EnvFilter` directives replacing the default filter
    pub filter: Option<String>,
    /// Host sink that receives a copy of every enabled event
    pub sink: Option<Arc<dyn LoggerSink>>,
    /// Log span creation and close
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            sink: None,
            span_events: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("sink", &self.sink.as_ref().map(|_| "LoggerSink { ... }"))
            .field("span_events", &self.span_events)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Check the filter directives without installing anything.
    pub fn validate(&self) -> Result<()> {
        self.env_filter().map(|_| ())
    }

    /// Custom directives if set, otherwise `warn` globally with the clipfeed
    /// crates at `level` and the HTTP stack pinned to `warn`.
    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }

        let level = self.level.as_str();
        std::iter::once("warn".to_string())
            .chain(CLIPFEED_CRATES.iter().map(|krate| format!("{krate}={level}")))
            .chain(QUIET_CRATES.iter().map(|krate| format!("{krate}=warn")))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.directives())
            .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] for invalid filter directives, or when a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;
    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(spans);
    let output = match config.format {
        LogFormat::Pretty => output.pretty().boxed(),
        LogFormat::Compact => output.compact().boxed(),
        LogFormat::Json => output
            .json()
            .flatten_event(true)
            .with_current_span(config.span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(config.sink.map(SinkForwarder::new))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// Mirrors events into a [`LoggerSink`].
struct SinkForwarder {
    sink: Arc<dyn LoggerSink>,
}

impl SinkForwarder {
    fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }

    /// Sinks are async; inside a runtime delivery is spawned, outside it
    /// blocks the emitting thread.
    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("log sink rejected entry: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("log sink rejected entry: {}", e);
                }
            }
        }
    }
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = fields.values;
        if let Some(span) = ctx.event_span(event) {
            entry = entry.with_span(span.name());
        }

        self.deliver(entry);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values
                    .insert(name.to_string(), redact_if_sensitive(name, &value));
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

/// `[REDACTED]` if the field name marks a credential or the value carries a
/// bearer token; the value unchanged otherwise.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const CREDENTIAL_MARKERS: &[&str] = &[
        "api_key",
        "apikey",
        "authorization",
        "bearer",
        "password",
        "secret",
        "token",
    ];

    let name = field_name.to_ascii_lowercase();
    let bearer_value = value
        .trim_start()
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));

    if bearer_value || CREDENTIAL_MARKERS.iter().any(|marker| name.contains(marker)) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}
