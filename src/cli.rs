//! Command-line front end.
//!
//! # Responsibilities
//! - Parse flags and layer them over the optional config file
//! - Build the record logger the rest of the process shares
//! - Read key and certificate files, then hand off to the [`Supervisor`]
//!
//! Every failure after the logger exists is reported as a fatal record on
//! stdout and turned into exit code 1.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

use crate::config::{load_config, validate_config, AppConfig, ConfigError, LogFormat, ObservabilityConfig};
use crate::http::{RouteTable, ServerOptions};
use crate::lifecycle::startup::read_pem;
use crate::lifecycle::{Startup, StartupError, Supervisor, SupervisorOptions};
use crate::observability::{logging, JsonLineSink, Level, Log, LogSink, TracingSink};

/// Command-line arguments.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "tls-router",
    version,
    about,
    override_usage = "tls-router --key <path> --cert <path> [options]"
)]
pub struct Args {
    /// Path to the private key of the server in PEM format.
    #[arg(short, long, value_name = "path")]
    pub key: Option<PathBuf>,

    /// Path to the certificate of the server in PEM format.
    #[arg(short, long, value_name = "path")]
    pub cert: Option<PathBuf>,

    /// The port to accept connections on. Default: 8443.
    #[arg(short, long, value_name = "port")]
    pub port: Option<u16>,

    /// The interface to accept connections on. Default: 0.0.0.0.
    #[arg(short, long, value_name = "interface")]
    pub interface: Option<String>,

    /// Optional TOML configuration file; flags take precedence.
    #[arg(long, value_name = "path")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(key) = &self.key {
            config.tls.key_path = Some(key.clone());
        }
        if let Some(cert) = &self.cert {
            config.tls.cert_path = Some(cert.clone());
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(interface) = &self.interface {
            config.listener.interface = Some(interface.clone());
        }
    }

    /// Config file (if any) with the flags applied. Not validated.
    pub fn resolve(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }
}

/// Parse the process arguments and run until shutdown.
///
/// `--help` and `--version` print and exit 0. Any other argument error is
/// reported like every other startup failure: fatal record, exit 1.
pub async fn run(routes: RouteTable) -> ExitCode {
    match Args::try_parse() {
        Ok(args) => run_with(args, routes).await,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        Err(err) => launch(Err(argument_error(&err)), routes).await,
    }
}

/// Run with already-parsed arguments.
pub async fn run_with(args: Args, routes: RouteTable) -> ExitCode {
    launch(Ok(args), routes).await
}

async fn launch(args: Result<Args, ConfigError>, routes: RouteTable) -> ExitCode {
    logging::init(logging::DEFAULT_FILTER);

    let resolved = args.and_then(|args| args.resolve());
    let observability = match &resolved {
        Ok(config) => config.observability.clone(),
        Err(_) => ObservabilityConfig::default(),
    };
    let log = build_log(&observability);

    let supervisor = Supervisor::new(log, SupervisorOptions::default());
    let code = supervisor
        .run(move |log| prepare(log, resolved, routes))
        .await;

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// First line of a clap error without its `error: ` prefix.
fn argument_error(err: &clap::Error) -> ConfigError {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    ConfigError::Arguments(line.trim_start_matches("error: ").trim().to_string())
}

/// Record logger for the configured format. An invalid level falls back to
/// `info`; validation reports it as a startup failure.
pub fn build_log(config: &ObservabilityConfig) -> Log {
    let level = config.log_level.parse().unwrap_or(Level::Info);
    let sink: Arc<dyn LogSink> = match config.log_format {
        LogFormat::Json => Arc::new(JsonLineSink::stdout(config.name.clone(), level)),
        LogFormat::Tracing => Arc::new(TracingSink),
    };
    Log::new(sink)
}

fn prepare(
    log: &Log,
    resolved: Result<AppConfig, ConfigError>,
    routes: RouteTable,
) -> Result<Startup, StartupError> {
    let config = resolved?;
    validate_config(&config)?;

    let key_path = config.tls.key_path.as_deref().ok_or(ConfigError::MissingKey)?;
    let cert_path = config.tls.cert_path.as_deref().ok_or(ConfigError::MissingCert)?;
    let key = read_pem(log, key_path, "Reading key.", "Key read.")?;
    let cert = read_pem(log, cert_path, "Reading cert.", "Cert read.")?;

    Ok(Startup {
        options: ServerOptions {
            key: Some(key),
            cert: Some(cert),
            log: log.clone(),
            drain_timeout: Duration::from_secs(config.listener.drain_timeout_secs),
        },
        routes,
        port: config.listener.port,
        interface: config.listener.interface,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;

    #[test]
    fn parses_short_and_long_flags() {
        let args = Args::try_parse_from([
            "tls-router", "-k", "a.key", "--cert", "a.crt", "-p", "9000", "-i", "127.0.0.1",
        ])
        .unwrap();
        assert_eq!(args.key, Some(PathBuf::from("a.key")));
        assert_eq!(args.cert, Some(PathBuf::from("a.crt")));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.interface.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn bad_port_becomes_config_error() {
        let err = Args::try_parse_from(["tls-router", "--port", "abc"]).unwrap_err();
        let config_err = argument_error(&err);
        assert!(matches!(config_err, ConfigError::Arguments(_)));
        let message = config_err.to_string();
        assert!(message.contains("--port"), "{message}");
        assert!(!message.starts_with("error:"));
        assert!(!message.contains('\n'));
    }

    #[test]
    fn argument_error_fails_prepare() {
        let err = Args::try_parse_from(["tls-router", "--bogus"]).unwrap_err();
        let sink = Arc::new(MemorySink::new(8));
        let failed = prepare(&Log::new(sink.clone()), Err(argument_error(&err)), RouteTable::new())
            .err()
            .unwrap();
        assert!(failed.to_string().contains("--bogus"));
        assert!(sink.is_empty());
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = AppConfig::default();
        config.listener.port = 1000;
        config.listener.interface = Some("10.0.0.1".into());

        let args = Args {
            port: Some(2000),
            ..Args::default()
        };
        args.apply(&mut config);
        assert_eq!(config.listener.port, 2000);
        assert_eq!(config.listener.interface.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn prepare_without_key_fails_before_reading() {
        let sink = Arc::new(MemorySink::new(8));
        let err = prepare(&Log::new(sink.clone()), Ok(AppConfig::default()), RouteTable::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "--key must be specified");
        assert!(sink.is_empty());
    }

    #[test]
    fn prepare_reads_both_files() {
        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let args = Args {
            key: Some(fixtures.join("server.key")),
            cert: Some(fixtures.join("server.crt")),
            port: Some(0),
            ..Args::default()
        };
        let sink = Arc::new(MemorySink::new(8));
        let startup = prepare(&Log::new(sink.clone()), args.resolve(), RouteTable::new()).unwrap();

        assert_eq!(startup.port, 0);
        assert!(startup.options.key.is_some_and(|k| !k.is_empty()));
        let msgs: Vec<String> = sink.records().into_iter().map(|r| r.msg).collect();
        assert_eq!(msgs, ["Reading key.", "Key read.", "Reading cert.", "Cert read."]);
    }
}
