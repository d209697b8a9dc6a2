//! Structured logging built on the `tracing` ecosystem.
//!
//! Supports pretty, JSON, and compact output formats plus an optional daily
//! rolling log file. The file writer is non-blocking; the returned
//! [`LogGuard`] must stay alive for the lifetime of the process so buffered
//! lines are flushed on shutdown.
//!
//! ```no_run
//! use paygate::logging::{init_logging, LogConfig};
//!
//! let _guard = init_logging(&LogConfig::default()).expect("logging init");
//! tracing::info!("gateway starting");
//! ```

use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Error type for logging initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Failed to create the log file or its parent directory.
    #[error("Failed to create log file: {0}")]
    FileCreation(String),

    /// Failed to install the subscriber (usually: already initialized).
    #[error("Failed to initialize logging: {0}")]
    SubscriberInit(String),

    /// Invalid configuration.
    #[error("Invalid log configuration: {0}")]
    InvalidConfig(String),
}

/// Minimum severity of messages that will be logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Verbose.
    Debug,
    /// Standard.
    #[default]
    Info,
    /// Quiet: warnings and errors only.
    Warn,
    /// Quietest: errors only.
    Error,
}

impl LogLevel {
    /// Convert to a tracing [`Level`].
    #[must_use]
    pub const fn as_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }

    /// String form accepted by the env filter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format with colors (default).
    #[default]
    Pretty,
    /// JSON structured format for log aggregation.
    Json,
    /// Compact single-line format.
    Compact,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
            Self::Compact => f.write_str("compact"),
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum severity. Defaults to [`LogLevel::Info`].
    pub level: LogLevel,

    /// Output format. Defaults to [`LogFormat::Pretty`].
    pub format: LogFormat,

    /// Optional log file. When set, logs are written here (daily rotation)
    /// in addition to stdout; the parent directory is created if missing.
    pub file_path: Option<PathBuf>,
}

/// Guard that flushes buffered file logs on drop.
///
/// Keep this alive for the duration of the program.
pub struct LogGuard {
    guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl LogGuard {
    const fn new(guard: Option<tracing_appender::non_blocking::WorkerGuard>) -> Self {
        Self { guard }
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("has_file_guard", &self.guard.is_some())
            .finish()
    }
}

/// Initialize the logging system.
///
/// Sets up the tracing subscriber with the specified configuration and
/// returns a guard that must be kept alive for the duration of logging.
///
/// # Errors
///
/// Returns [`LogError`] if the log file directory cannot be created or the
/// subscriber cannot be installed (e.g. it was already initialized).
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LogError> {
    let filter = EnvFilter::try_new(config.level.as_str())
        .map_err(|e| LogError::InvalidConfig(e.to_string()))?;

    let (file_writer, guard) = if let Some(ref path) = config.file_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LogError::FileCreation(format!("{}: {}", parent.display(), e)))?;
        }

        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LogError::InvalidConfig("Invalid log file name".to_string()))?;

        let file_appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(non_blocking), Some(guard))
    } else {
        (None, None)
    };

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE);

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            }
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true);

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer().json().with_writer(writer).with_target(true);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            }
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(true);

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e| LogError::SubscriberInit(e.to_string()))?;
            }
        }
    }

    Ok(LogGuard::new(guard))
}

/// Convert a CLI verbosity count (`-v`, `-vv`, `-vvv`) to a [`LogLevel`].
///
/// | Verbosity | Level |
/// |-----------|-------|
/// | 0         | Warn  |
/// | 1         | Info  |
/// | 2         | Debug |
/// | 3+        | Trace |
#[must_use]
pub const fn verbosity_to_level(verbosity: u8) -> LogLevel {
    match verbosity {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}
