//! Configuration schema definitions.
//!
//! All sections default so an empty file (or no file) is a valid starting
//! point; command-line flags are layered on top afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::observability::Level;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where to accept connections.
    pub listener: ListenerConfig,

    /// Key and certificate locations.
    pub tls: TlsConfig,

    /// Record stream settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to accept connections on.
    pub port: u16,

    /// Interface (IP literal) to bind; all interfaces when unset.
    pub interface: Option<String>,

    /// Seconds in-flight requests get to finish on shutdown.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 8443,
            interface: None,
            drain_timeout_secs: 10,
        }
    }
}

/// TLS material locations (PEM files).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub key_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
}

/// Output format of the record stream.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line on stdout.
    #[default]
    Json,
    /// Records re-emitted through `tracing`.
    Tracing,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `name` field of every record.
    pub name: String,

    /// Minimum record level (`trace` .. `fatal`).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            log_level: Level::Info.as_str().to_string(),
            log_format: LogFormat::Json,
        }
    }
}
