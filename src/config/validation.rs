//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require key and certificate locations
//! - Check the log level names a real level
//!
//! # Design Decisions
//! - Runs after command-line overrides, so the error names the flag
//! - Validation is a pure function of the merged config

use super::loader::ConfigError;
use super::schema::AppConfig;
use crate::observability::Level;

/// Check a fully merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.tls.key_path.is_none() {
        return Err(ConfigError::MissingKey);
    }
    if config.tls.cert_path.is_none() {
        return Err(ConfigError::MissingCert);
    }
    log_level(config)?;
    Ok(())
}

/// Parsed minimum log level.
pub fn log_level(config: &AppConfig) -> Result<Level, ConfigError> {
    config
        .observability
        .log_level
        .parse()
        .map_err(ConfigError::InvalidLogLevel)
}
