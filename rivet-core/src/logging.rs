//! Logging setup for Rivet applications.
//!
//! Everything in the framework logs through `tracing`. [`LogConfig`] installs
//! a global subscriber with one of four formats (JSON, plain, pretty,
//! compact) writing to stdout, stderr, a file or a rolling file through a
//! non-blocking writer. JSON to stdout at `info` is the default.
//!
//! ```no_run
//! use rivet_core::logging::*;
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .with_env_filter("rivet_core=trace,hyper=info")
//!     .init()
//!     .expect("logging");
//!
//! info!("Application started");
//! ```
//!
//! The returned [`WorkerGuard`] flushes buffered records when dropped and
//! must be kept alive for as long as the application logs.

use crate::Error;
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Directive understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Internal(format!("unknown log level '{}'", other))),
        }
    }
}

/// Output format for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, one JSON object per line
    Json,
    Plain,
    /// Multi-line, for development
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" | "text" => Ok(LogFormat::Plain),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Internal(format!("unknown log format '{}'", other))),
        }
    }
}

/// Output destination for log records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to a single file
    File(String),
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    /// Include the module path of each record
    pub targets: bool,
    pub file_line: bool,
    /// Emit span close events
    pub spans: bool,
    /// ANSI colors; ignored for JSON
    pub colors: bool,
    /// Filter directives; overrides `level` and `RUST_LOG` when set
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set filter directives such as `"rivet_core=debug,hyper=info"`
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter from `env_filter`, then `RUST_LOG`, then `level`.
    fn filter(&self) -> Result<EnvFilter, Error> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| Error::Internal(format!("invalid log filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// Fails if the filter is invalid, the log file cannot be opened or a
    /// global subscriber is already set.
    pub fn init(self) -> Result<WorkerGuard, Error> {
        let filter = self.filter()?;

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => tracing_appender::non_blocking(tracing_appender::rolling::RollingFileAppender::new(
                rotation.to_tracing_rotation(),
                directory,
                prefix,
            )),
        };

        self.install(writer, filter)?;
        Ok(guard)
    }

    fn install<W>(&self, writer: W, filter: EnvFilter) -> Result<(), Error>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(self.spans)
                        .with_span_list(self.spans)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
        };

        result.map_err(|e| Error::Internal(format!("failed to install log subscriber: {}", e)))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_parse_level_and_format() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());

        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Plain);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.targets);
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        let config = LogConfig::new().with_env_filter("rivet_core=verbose");
        assert!(config.filter().is_err());
    }
}
