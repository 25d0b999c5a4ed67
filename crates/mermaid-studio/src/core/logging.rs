//! Logging infrastructure for the studio
//!
//! Structured logging goes through the `tracing` crate. Compile runs,
//! pipeline transitions and correction requests open spans; activity entries
//! shown to the user are mirrored as events.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mermaid_studio::core::logging::init_logging;
//!
//! // Level and format from the environment, or info/compact
//! init_logging(None, None)?;
//!
//! // Explicit settings
//! init_logging(Some("debug"), Some("pretty"))?;
//! ```
//!
//! # Environment Variables
//!
//! - `MERMAID_STUDIO_LOG_LEVEL`: log level (trace|debug|info|warn|error|off)
//! - `MERMAID_STUDIO_LOG_FORMAT`: output format (compact|pretty|json)
//! - `RUST_LOG`: standard `EnvFilter` directives, e.g.
//!   `RUST_LOG="info,mermaid_studio::pipeline=trace"`

use std::str::FromStr;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use super::StudioError;

/// Environment variable holding the log level
pub const LOG_LEVEL_ENV: &str = "MERMAID_STUDIO_LOG_LEVEL";

/// Environment variable holding the log format
pub const LOG_FORMAT_ENV: &str = "MERMAID_STUDIO_LOG_FORMAT";

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact single-line format
    #[default]
    Compact,
    /// Pretty multi-line format with colors
    Pretty,
    /// JSON format for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl LogFormat {
    /// Get all valid format names
    pub fn variants() -> &'static [&'static str] {
        &["compact", "pretty", "json"]
    }
}

/// Resolve the effective log level: argument, then environment, then `info`
pub fn resolve_level(level: Option<&str>) -> String {
    level
        .map(|s| s.to_string())
        .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string())
}

/// Resolve the effective log format: argument, then environment, then `compact`
pub fn resolve_format(format: Option<&str>) -> Result<LogFormat, StudioError> {
    let name = format
        .map(|s| s.to_string())
        .or_else(|| std::env::var(LOG_FORMAT_ENV).ok());

    match name {
        Some(name) => LogFormat::from_str(&name).map_err(StudioError::logging),
        None => Ok(LogFormat::default()),
    }
}

fn build_filter(level: &str) -> EnvFilter {
    if level == "off" {
        return EnvFilter::new("off");
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber
///
/// Fails if the format is unknown or a global subscriber is already set.
pub fn init_logging(level: Option<&str>, format: Option<&str>) -> Result<(), StudioError> {
    let format = resolve_format(format)?;
    let filter = build_filter(&resolve_level(level));

    let result = match format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(
                fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(filter)
            .with(
                fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::ACTIVE)
                    .pretty(),
            )
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(
                fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .json(),
            )
            .try_init(),
    };

    result.map_err(|e| StudioError::logging(e.to_string()))
}

/// Initialize logging with default settings (info level, compact format)
pub fn init_default_logging() -> Result<(), StudioError> {
    init_logging(None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("compact").unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(resolve_level(Some("trace")), "trace");
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(resolve_format(Some("pretty")).unwrap(), LogFormat::Pretty);
        assert!(resolve_format(Some("xml")).is_err());
    }
}
