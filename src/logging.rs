//! Structured logging setup with tracing

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install global subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize the global tracing subscriber.
///
/// The `default_level` is used when `RUST_LOG` is not set. Returns an error if
/// a subscriber was already installed, so tests can call this repeatedly and
/// ignore the result.
pub fn init_tracing(default_level: &str) -> Result<(), LoggingError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) => EnvFilter::try_new(env)?,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
