//! Startup sequence.
//!
//! # Data Flow
//! ```text
//! Process details → prepared Startup (config + PEM material)
//!     → Server::new → Server::listen → "Server started."
//! ```
//!
//! Every step logs before and after itself so a failed start can be located
//! from the record stream alone.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::ConfigError;
use crate::http::{RouteTable, Server, ServerError, ServerOptions};
use crate::observability::{Level, Log};

/// Error that aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Everything needed to build and bind the server.
pub struct Startup {
    pub options: ServerOptions,
    pub routes: RouteTable,
    pub port: u16,
    pub interface: Option<String>,
}

/// Static facts about the running process, logged once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetails {
    pub arch: &'static str,
    pub platform: &'static str,
    pub cwd: Option<String>,
    pub argv: Vec<String>,
    pub package: String,
    pub version: String,
}

impl ProcessDetails {
    pub fn capture(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            arch: std::env::consts::ARCH,
            platform: std::env::consts::OS,
            cwd: std::env::current_dir()
                .ok()
                .map(|dir| dir.display().to_string()),
            argv: std::env::args().collect(),
            package: package.into(),
            version: version.into(),
        }
    }

    pub fn log(&self, log: &Log) {
        log.log(Level::Info, to_fields(self), "Process details.");
    }
}

/// Read a PEM file, logging `reading` / `read` around it.
pub fn read_pem(log: &Log, path: &Path, reading: &str, read: &str) -> Result<Vec<u8>, StartupError> {
    let filename = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let fields = serde_json::json!({ "filename": filename.display().to_string() });

    log.log(Level::Info, fields.clone(), reading);
    let bytes = std::fs::read(&filename).map_err(|source| StartupError::Read {
        path: filename.clone(),
        source,
    })?;
    log.log(Level::Info, fields, read);
    Ok(bytes)
}

/// Build the server and bind it.
///
/// On a bind failure the half-built server is returned alongside the error
/// so the caller's shutdown sees it.
pub async fn start(log: &Log, startup: Startup) -> Result<Server, (Option<Server>, StartupError)> {
    log.info("Creating server.");
    let server = match Server::new(startup.options, startup.routes) {
        Ok(server) => server,
        Err(err) => return Err((None, err.into())),
    };
    log.info("Server created.");

    log.info("Starting server.");
    if let Err(err) = server.listen(startup.port, startup.interface.as_deref()).await {
        return Err((Some(server), err.into()));
    }
    let address = server.address().map(|a| to_fields(&a)).unwrap_or(Value::Null);
    log.log(Level::Info, address, "Server started.");

    Ok(server)
}

fn to_fields<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
