//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the configuration is loaded.
//! Library modules only emit `tracing` events; nothing is printed unless a
//! subscriber is installed.

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; `level` (`"error"`, `"warn"`, `"info"`,
/// `"debug"`, `"trace"`, case-insensitive) is the fallback.
pub fn init(level: &str) -> Result<()> {
    let level = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to set subscriber: {e}"))
}

/// Parse a log level string, rejecting unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.trim().is_empty() {
        return Err(anyhow!("log level must not be empty"));
    }
    level
        .trim()
        .to_ascii_lowercase()
        .parse::<LevelFilter>()
        .map_err(|_| anyhow!("unrecognised log level: '{level}'"))
}
