//! Logging configuration.
//!
//! The balancer emits structured `tracing` events for every observable
//! decision it makes: distribution summaries, steal decisions, renewal and
//! claim outcomes. This module wires those events to stderr; exporting
//! them anywhere else is the host application's concern.
//!
//! # Environment variables
//!
//! - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: level filtering (default: `info`)
//!
//! ```rust,no_run
//! use hubbub::telemetry::{LogFormat, init_logging};
//!
//! init_logging(LogFormat::from_env()).expect("failed to init logging");
//! ```

use tracing_subscriber::prelude::*;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output (default).
    #[default]
    Pretty,
    /// JSON lines for log aggregators.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        })
    }
}

impl LogFormat {
    /// Read from the `LOG_FORMAT` environment variable.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Initialize logging with the specified format.
///
/// Call once at application startup. Levels are controlled through the
/// `RUST_LOG` environment variable; the default keeps ownership
/// transitions visible (`info`) and hides per-cycle arithmetic (`debug`).
pub fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("anything".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_default_is_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
