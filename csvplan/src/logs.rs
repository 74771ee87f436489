//! Logging setup and progress helpers.
//!
//! Everything is emitted as `tracing` events. The binary installs one
//! subscriber at startup with [`init_logging`]; as a library the crate only
//! emits events and leaves the subscriber to the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output with colors and event fields.
    #[default]
    Pretty,
    /// Condensed single-line output.
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty, compact or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Configuration for logging behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `csvplan=debug`.
    pub filter: String,
    pub format: LogFormat,
    /// Whether to use ANSI colors in output.
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Raise the level for each `-v`: one gives debug, two or more give trace.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        match verbosity {
            0 => {}
            1 => self.filter = "debug".to_string(),
            _ => self.filter = "trace".to_string(),
        }
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Check that a filter directive parses.
pub fn validate_filter(directive: &str) -> Result<(), String> {
    EnvFilter::try_new(directive)
        .map(|_| ())
        .map_err(|e| format!("invalid log filter '{directive}': {e}"))
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for command output.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(layer_fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                layer_fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(false)
                    .with_ansi(config.with_ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                layer_fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_ansi(config.with_ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    info!("{}", msg.into());
}

pub fn log_success(msg: impl Into<String>) {
    info!(outcome = "success", "{}", msg.into());
}

pub fn log_warning(msg: impl Into<String>) {
    warn!("{}", msg.into());
}

pub fn log_error(msg: impl Into<String>) {
    error!("{}", msg.into());
}
