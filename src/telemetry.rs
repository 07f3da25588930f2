//! Tracing subscriber setup.
//!
//! Logs go to stderr so `render` can write HTML to stdout untouched.
//! `RUST_LOG` overrides the configured level.

use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{ConfigError, LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
pub fn init(logging: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level_filter()?.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| TelemetryError::Init(err.to_string()))
}
