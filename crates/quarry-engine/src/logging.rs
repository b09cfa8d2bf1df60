//! Logging configuration for the engine

use std::env;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Logging configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Whether to include file and line numbers
    pub include_location: bool,
    /// Explicit filter string, overrides `level` when present
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Level::INFO);

        let json_format = env::var("LOG_JSON_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        let include_location = env::var("LOG_INCLUDE_LOCATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        let env_filter = env::var("RUST_LOG").ok();

        Self { level, json_format, include_location, env_filter }
    }

    /// Initialize the global tracing subscriber
    pub fn init_tracing(&self) -> Result<()> {
        let filter = if let Some(ref env_filter) = self.env_filter {
            EnvFilter::try_new(env_filter)?
        } else {
            EnvFilter::default()
                .add_directive(format!("quarry_engine={}", self.level).parse()?)
                .add_directive("qdrant_client=info".parse()?)
                .add_directive("hyper=info".parse()?)
        };

        let fmt_layer = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(true);

        let fmt_layer = if self.json_format {
            fmt_layer.json().boxed()
        } else {
            fmt_layer.boxed()
        };

        Registry::default().with(filter).with(fmt_layer).try_init()?;

        Ok(())
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging() -> Result<()> {
    LoggingConfig::from_env().init_tracing()
}
