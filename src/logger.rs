//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the configuration is loaded.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::errors::{CareError, Result};

/// Initialise the global tracing subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `level` is used.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CareError::Config(format!("invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CareError::Config(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a log level string, rejecting anything tracing does not know.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.is_empty() {
        return Err(CareError::Config("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| CareError::Config(format!("unrecognised log level: '{level}'")))
}
