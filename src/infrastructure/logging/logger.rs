use std::io;

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

const LOG_FILE_PREFIX: &str = "gatehouse.log";

/// Global tracing subscriber plus the guard that keeps the file writer
/// flushing until shutdown.
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Install the global subscriber described by the logging configuration.
    ///
    /// Hold the returned value for the lifetime of the process; dropping it
    /// stops the background file writer.
    ///
    /// # Errors
    /// Returns an error on an unknown level or format string.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;

        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let guard = if let Some(ref directory) = config.directory {
            let file_appender = rolling::daily(directory, LOG_FILE_PREFIX);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File output stays JSON regardless of the console format.
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter.clone());

            match config.format.as_str() {
                "json" => {
                    let console_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_filter(env_filter);

                    tracing_subscriber::registry().with(file_layer).with(console_layer).init();
                }
                "pretty" => {
                    let console_layer = tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter);

                    tracing_subscriber::registry().with(file_layer).with(console_layer).init();
                }
                other => anyhow::bail!("Invalid log format: {other}"),
            }

            Some(guard)
        } else {
            match config.format.as_str() {
                "json" => {
                    let console_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_filter(env_filter);

                    tracing_subscriber::registry().with(console_layer).init();
                }
                "pretty" => {
                    let console_layer = tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter);

                    tracing_subscriber::registry().with(console_layer).init();
                }
                other => anyhow::bail!("Invalid log format: {other}"),
            }

            None
        };

        tracing::info!(
            level = %config.level,
            format = %config.format,
            file_output = config.directory.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(matches!(parse_log_level("WARN"), Ok(Level::WARN)));
        assert!(parse_log_level("shouting").is_err());
    }

    #[test]
    fn rejects_unknown_level_before_installing() {
        let config = LoggingConfig { level: "loud".to_string(), ..LoggingConfig::default() };
        assert!(Logger::init(&config).is_err());
    }

    #[test]
    fn rejects_unknown_format_before_installing() {
        let config = LoggingConfig { format: "xml".to_string(), ..LoggingConfig::default() };
        assert!(Logger::init(&config).is_err());
    }

    #[test]
    fn init_installs_a_console_subscriber() {
        // The one test allowed to set the global subscriber; file wiring is
        // covered by running the binary.
        let config = LoggingConfig::default();
        let logger = Logger::init(&config).unwrap();
        assert!(logger._guard.is_none());
    }
}
