//! Structured logging to stderr.
//!
//! stdout carries only command payloads, so every log line goes to stderr.

use clap::ValueEnum;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "ORGSCOPE_LOG";
const LOG_FORMAT_ENV: &str = "ORGSCOPE_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    #[must_use]
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Flag value, else environment, else default.
pub fn resolve_level(flag: Option<LogLevel>, env: Option<&str>) -> LogLevel {
    flag.or_else(|| env.and_then(LogLevel::from_arg))
        .unwrap_or_default()
}

pub fn resolve_format(flag: Option<LogFormat>, env: Option<&str>) -> LogFormat {
    flag.or_else(|| env.and_then(LogFormat::from_arg))
        .unwrap_or_default()
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::new(format!(
        "orgscope={level},orgscope_core={level},orgscope_cli={level}",
        level = level.as_filter()
    ))
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init(level: Option<LogLevel>, format: Option<LogFormat>) {
    let level = resolve_level(level, std::env::var(LOG_LEVEL_ENV).ok().as_deref());
    let format = resolve_format(format, std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    let writer = || BoxMakeWriter::new(std::io::stderr);

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter_for(level))
                .json()
                .with_writer(writer())
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(filter_for(level))
                .compact()
                .with_writer(writer())
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(filter_for(level))
                .with_writer(writer())
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_environment() {
        assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), LogLevel::Debug);
        assert_eq!(resolve_format(Some(LogFormat::Json), Some("compact")), LogFormat::Json);
    }

    #[test]
    fn environment_beats_default() {
        assert_eq!(resolve_level(None, Some("verbose")), LogLevel::Debug);
        assert_eq!(resolve_format(None, Some(" COMPACT ")), LogFormat::Compact);
    }

    #[test]
    fn unknown_environment_value_falls_back_to_default() {
        assert_eq!(resolve_level(None, Some("loud")), LogLevel::Warn);
        assert_eq!(resolve_format(None, None), LogFormat::Human);
    }
}
