//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use super::schema::AppConfig;
use crate::observability::log::ParseLevelError;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Arguments(String),

    #[error("--key must be specified")]
    MissingKey,

    #[error("--cert must be specified")]
    MissingCert,

    #[error(transparent)]
    InvalidLogLevel(#[from] ParseLevelError),
}

/// Load configuration from a TOML file.
///
/// The result is not validated yet: command-line flags may still fill in
/// required values.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nport = 10443\ninterface = \"127.0.0.1\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.port, 10443);
        assert_eq!(config.listener.interface.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/router.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener\nport = ").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
