//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Map configured level names onto filter directives
//! - Change the log level at runtime (config reload)
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level at startup
//! - File output rotates (daily by default) and is written off the
//!   request path by a background worker

use std::path::Path;
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

use crate::config::schema::{LogFormat, LogRotation, ObservabilityConfig};

/// Error type for logging setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("unsupported log level: {0}")]
    UnknownLevel(String),
    #[error("log output {0} does not name a file")]
    NoFileName(String),
    #[error("failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: InitError,
    },
    #[error("failed to install subscriber: {0}")]
    Init(String),
    #[error("failed to reload log level: {0}")]
    Reload(String),
}

/// Translate a configured level name into a filter directive.
///
/// Accepts the usual level names plus `fatal` (error), `all` (trace) and
/// `off`/`none`.
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "all" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "fatal" => Some("error"),
        "off" | "none" => Some("off"),
        _ => None,
    }
}

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// Handle kept by the process to adjust logging after startup.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    /// Flushes buffered file output when the last handle drops.
    _guard: Option<Arc<WorkerGuard>>,
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}

impl LogHandle {
    /// Replace the active filter with the given level.
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        let directive =
            level_directive(level).ok_or_else(|| LoggingError::UnknownLevel(level.to_string()))?;
        self.filter
            .reload(EnvFilter::new(directive))
            .map_err(|e| LoggingError::Reload(e.to_string()))?;
        tracing::info!(level = directive, "Log level changed");
        Ok(())
    }
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    }
}

type Sink = (BoxMakeWriter, bool, Option<WorkerGuard>);

fn writer_for(output: &str, rotate: LogRotation) -> Result<Sink, LoggingError> {
    match output {
        "stdout" | "" => Ok((BoxMakeWriter::new(std::io::stdout), true, None)),
        "stderr" => Ok((BoxMakeWriter::new(std::io::stderr), true, None)),
        path => {
            let file = Path::new(path);
            let prefix = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| LoggingError::NoFileName(path.to_string()))?;
            let dir = match file.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };

            let appender = RollingFileAppender::builder()
                .rotation(rotation(rotate))
                .filename_prefix(prefix)
                .build(dir)
                .map_err(|source| LoggingError::File {
                    path: path.to_string(),
                    source,
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            Ok((BoxMakeWriter::new(writer), false, Some(guard)))
        }
    }
}

/// Install the global subscriber described by `config`.
pub fn init(config: &ObservabilityConfig) -> Result<LogHandle, LoggingError> {
    let directive = level_directive(&config.log_level)
        .ok_or_else(|| LoggingError::UnknownLevel(config.log_level.clone()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let (filter, handle) = reload::Layer::new(env_filter);

    let (writer, ansi, guard) = writer_for(&config.log_output, config.log_rotation)?;
    let fmt_layer: Box<dyn Layer<FilteredRegistry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().with_ansi(ansi).with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogHandle {
        filter: handle,
        _guard: guard.map(Arc::new),
    })
}
