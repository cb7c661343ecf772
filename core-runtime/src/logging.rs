//! # Logging
//!
//! Installs the process-wide `tracing` subscriber for the player core.
//!
//! One call to [`init_logging`] stacks three layers on a registry:
//!
//! 1. an `EnvFilter`, either a caller-supplied directive string or the core
//!    crates at [`LoggingConfig::level`] with everything else at `warn`
//! 2. an optional layer mirroring every surviving event to the host's
//!    [`LoggerSink`] as a [`LogEntry`]
//! 3. a stdout formatter in the configured [`LogFormat`]
//!
//! URIs name the user's files, so with [`LoggingConfig::redact_paths`] set
//! the `uri` and `path` fields forwarded to the host keep only the file name
//! (or the host, for network URIs). Stdout output is left untouched.
//!
//! ```ignore
//! use bridge_traits::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{LogEntry, LogLevel, LoggerSink};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates the default filter raises to the configured level.
const CORE_CRATES: &[&str] = &[
    "bridge_traits",
    "core_runtime",
    "core_playback",
    "core_metadata",
    "core_library",
    "core_service",
];

/// Event fields that carry user file locations.
const LOCATION_FIELDS: &[&str] = &["uri", "path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured; the debug-build default
    Pretty,
    /// One JSON object per event; the release-build default
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level of the core crates under the default filter
    pub level: LogLevel,
    /// Reduce `uri`/`path` fields sent to the host sink to a file name
    pub redact_paths: bool,
    /// Full `EnvFilter` directive string, replacing the default filter
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Report span enter/exit (pretty) or span context (JSON)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_paths: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_paths", &self.redact_paths)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .field("display_thread_info", &self.display_thread_info)
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

    pub fn with_path_redaction(mut self, redact: bool) -> Self {
        self.redact_paths = redact;
        self
    }

    /// Replace the default filter, e.g. `"warn,core_metadata=trace"`.
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    /// Mirror events to the host's logger.
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enabled: bool) -> Self {
        self.enable_spans = enabled;
        self
    }

    pub fn with_target(mut self, shown: bool) -> Self {
        self.display_target = shown;
        self
    }

    pub fn with_thread_info(mut self, shown: bool) -> Self {
        self.display_thread_info = shown;
        self
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] for a malformed filter string, [`Error::Logging`] if a
/// global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = config
        .logger_sink
        .clone()
        .map(|sink| HostForwardLayer::new(sink, config.redact_paths));

    tracing_subscriber::registry()
        .with(filter)
        .with(forward)
        .with(output_layer(&config))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config.filter.clone().unwrap_or_else(|| {
        std::iter::once("warn".to_string())
            .chain(
                CORE_CRATES
                    .iter()
                    .map(|krate| format!("{}={}", krate, config.level.as_str())),
            )
            .collect::<Vec<_>>()
            .join(",")
    });

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn output_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(std::io::stdout);

    match config.format {
        LogFormat::Pretty => base
            .pretty()
            .with_span_events(if config.enable_spans {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Mirrors events into a [`LoggerSink`].
///
/// Inside a tokio runtime the sink call is spawned; elsewhere it is driven to
/// completion on the logging thread.
struct HostForwardLayer {
    sink: Arc<dyn LoggerSink>,
    redact_paths: bool,
}

impl HostForwardLayer {
    fn new(sink: Arc<dyn LoggerSink>, redact_paths: bool) -> Self {
        Self { sink, redact_paths }
    }

    fn entry(&self, event: &Event<'_>, level: LogLevel, span: Option<&str>) -> LogEntry {
        let mut fields = EntryFields::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let message = fields
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let entry = fields.values.into_iter().fold(
            LogEntry::new(level, metadata.target(), message),
            |entry, (name, value)| {
                if self.redact_paths && LOCATION_FIELDS.contains(&name) {
                    entry.with_field(name, redact_uri(&value))
                } else {
                    entry.with_field(name, value)
                }
            },
        );

        match span {
            Some(span) => entry.with_span(span),
            None => entry,
        }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("Host logger rejected entry: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("Host logger rejected entry: {}", e);
                }
            }
        }
    }
}

impl<S> Layer<S> for HostForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = sink_level(event.metadata().level());
        if level < self.sink.min_level() {
            return;
        }

        let span = ctx.lookup_current();
        let entry = self.entry(event, level, span.as_ref().map(|s| s.name()));
        self.deliver(entry);
    }
}

/// Collects an event's message and fields as strings.
#[derive(Default)]
struct EntryFields {
    message: Option<String>,
    values: BTreeMap<&'static str, String>,
}

impl EntryFields {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name, value);
            }
        }
    }
}

impl Visit for EntryFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{:?}", value));
    }
}

fn sink_level(level: &Level) -> LogLevel {
    if *level == Level::ERROR {
        LogLevel::Error
    } else if *level == Level::WARN {
        LogLevel::Warn
    } else if *level == Level::INFO {
        LogLevel::Info
    } else if *level == Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

/// Reduce a URI to something safe to ship off-device.
///
/// Local `file:` URIs and bare paths keep only their file name; network URIs
/// keep scheme and host.
///
/// ```
/// use core_runtime::logging::redact_uri;
///
/// assert_eq!(redact_uri("file:///home/ana/Music/song.ogg"), "file://.../song.ogg");
/// assert_eq!(redact_uri("http://radio.example/live?key=1"), "http://radio.example/...");
/// ```
pub fn redact_uri(uri: &str) -> String {
    match uri.split_once("://") {
        Some(("file", path)) => format!("file://.../{}", strip_path(path)),
        Some((scheme, rest)) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            format!("{}://{}/...", scheme, host)
        }
        None => strip_path(uri).to_string(),
    }
}

/// Last component of a `/` or `\` separated path.
///
/// ```
/// use core_runtime::logging::strip_path;
///
/// assert_eq!(strip_path("/srv/music/Album/07.flac"), "07.flac");
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
