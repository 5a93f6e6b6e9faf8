//! Environment variable names used by this crate for convenient
//! configuration of the adapter from deployment environments.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

use crate::config::{AdapterConfig, ConfigError};
use crate::logger::LineEnding;

/// Initial threshold of the response logger, e.g. `info` or `silent`.
pub const LOG_ADAPTER_RESPONSE_LEVEL_ENV: &str = "LOG_ADAPTER_RESPONSE_LEVEL";

/// Initial threshold of the event logger.
pub const LOG_ADAPTER_EVENT_LEVEL_ENV: &str = "LOG_ADAPTER_EVENT_LEVEL";

/// Set to `1` to terminate lines with `\r\n` instead of `\n`.
pub const LOG_ADAPTER_CRLF_ENV: &str = "LOG_ADAPTER_CRLF";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Overlay environment settings onto a configuration.
pub fn apply_env(mut config: AdapterConfig) -> Result<AdapterConfig, ConfigError> {
    if let Ok(level) = std::env::var(LOG_ADAPTER_RESPONSE_LEVEL_ENV) {
        config.response_level = level.parse().map_err(ConfigError::InvalidThreshold)?;
    }
    if let Ok(level) = std::env::var(LOG_ADAPTER_EVENT_LEVEL_ENV) {
        config.event_level = level.parse().map_err(ConfigError::InvalidThreshold)?;
    }
    if env_or(LOG_ADAPTER_CRLF_ENV, "0") == "1" {
        config.line_ending = LineEnding::CrLf;
    }
    Ok(config)
}
