//! Process supervisor.
//!
//! # Responsibilities
//! - Install fault and signal hooks before the server exists
//! - Run the startup sequence and own the resulting [`Server`]
//! - Turn the first signal or fault into a single shutdown and an exit code
//!
//! # Design Decisions
//! - Signals, faults and test-driven triggers share one channel
//! - Triggers arriving while shutting down are logged and otherwise ignored
//! - The exit code is returned, never applied; `main` decides to exit

use serde_json::json;
use tokio::sync::mpsc;

use super::faults::{install_panic_hook, Fault, FaultReporter, UncaughtPanic};
use super::shutdown::{stop_server, Phase, ShutdownState};
use super::signals::{self, Signal};
use super::startup::{start, ProcessDetails, Startup, StartupError};
use crate::http::Server;
use crate::observability::{serialize, Level, Log};

/// Exit code after a signal-driven shutdown.
pub const EXIT_OK: i32 = 0;
/// Exit code after a startup failure or a process fault.
pub const EXIT_FAILURE: i32 = 1;

/// Something that ends the running phase.
#[derive(Debug)]
pub enum Trigger {
    Signal(Signal),
    Fault(Fault),
}

impl Trigger {
    pub fn exit_code(&self) -> i32 {
        match self {
            Trigger::Signal(_) => EXIT_OK,
            Trigger::Fault(_) => EXIT_FAILURE,
        }
    }
}

/// Which process-wide hooks the supervisor installs.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub package: String,
    pub version: String,
    /// Forward SIGINT / SIGTERM.
    pub handle_signals: bool,
    /// Install the panic hook reporting uncaught panics.
    pub capture_panics: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            package: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            handle_signals: true,
            capture_panics: true,
        }
    }
}

/// Cloneable handle for injecting triggers into a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl SupervisorHandle {
    pub fn trigger(&self, trigger: Trigger) {
        let _ = self.tx.send(trigger);
    }

    /// Behave as if SIGINT was delivered.
    pub fn interrupt(&self) {
        self.trigger(Trigger::Signal(Signal::Interrupt));
    }

    /// Behave as if SIGTERM was delivered.
    pub fn terminate(&self) {
        self.trigger(Trigger::Signal(Signal::Terminate));
    }

    pub fn reporter(&self) -> FaultReporter {
        FaultReporter::new(self.tx.clone())
    }
}

/// Owns the server and the shutdown sequence for one process run.
pub struct Supervisor {
    log: Log,
    options: SupervisorOptions,
    state: ShutdownState,
    tx: mpsc::UnboundedSender<Trigger>,
    rx: mpsc::UnboundedReceiver<Trigger>,
    server: Option<Server>,
}

impl Supervisor {
    pub fn new(log: Log, options: SupervisorOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            log,
            options,
            state: ShutdownState::new(),
            tx,
            rx,
            server: None,
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Run to completion and return the process exit code.
    ///
    /// `prepare` runs after the hooks are installed and the process details
    /// are logged; it produces the server inputs (config, PEM material, routes).
    pub async fn run<P>(mut self, prepare: P) -> i32
    where
        P: FnOnce(&Log) -> Result<Startup, StartupError> + Send,
    {
        self.install_hooks();
        ProcessDetails::capture(&self.options.package, &self.options.version).log(&self.log);

        let started = match prepare(&self.log) {
            Ok(startup) => start(&self.log, startup).await,
            Err(err) => Err((None, err)),
        };

        let code = match started {
            Ok(server) => {
                self.server = Some(server);
                match self.rx.recv().await {
                    Some(trigger) => {
                        announce(&self.log, &trigger);
                        trigger.exit_code()
                    }
                    None => EXIT_OK,
                }
            }
            Err((server, err)) => {
                self.server = server;
                self.log.log(
                    Level::Fatal,
                    json!({ "error": serialize::error(&err) }),
                    "Failed to start.",
                );
                EXIT_FAILURE
            }
        };

        self.shutdown(code).await
    }

    fn install_hooks(&self) {
        if self.options.capture_panics {
            install_panic_hook(FaultReporter::new(self.tx.clone()));
        }
        if self.options.handle_signals {
            if let Err(err) = signals::install(self.tx.clone()) {
                self.log.log(
                    Level::Warn,
                    json!({ "error": serialize::error(&err) }),
                    "Failed to install signal handlers.",
                );
            }
        }
    }

    /// Single-shot shutdown; returns `code` once the server is stopped.
    async fn shutdown(mut self, code: i32) -> i32 {
        if !self.state.begin() {
            return code;
        }

        if let Some(server) = self.server.take() {
            let log = &self.log;
            let rx = &mut self.rx;
            let stopping = stop_server(log, &server);
            tokio::pin!(stopping);
            loop {
                tokio::select! {
                    () = &mut stopping => break,
                    Some(late) = rx.recv() => {
                        announce(log, &late);
                        log.warn("Shutdown already in progress.");
                    }
                }
            }
        }

        self.state.finish();
        code
    }
}

/// Log the record a trigger deserves.
fn announce(log: &Log, trigger: &Trigger) {
    match trigger {
        Trigger::Signal(signal) => log.info(format!("{} received.", signal.name())),
        Trigger::Fault(Fault::Panic { message, location }) => {
            let err = UncaughtPanic {
                message: message.clone(),
                location: location.clone(),
            };
            log.log(
                Level::Fatal,
                json!({ "error": serialize::error(&err), "location": location }),
                "Uncaught exception.",
            );
        }
        Trigger::Fault(Fault::Rejection(err)) => log.log(
            Level::Fatal,
            json!({ "error": serialize::error(&**err) }),
            "Unhandled rejection.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;
    use std::sync::Arc;

    fn quiet() -> SupervisorOptions {
        SupervisorOptions {
            handle_signals: false,
            capture_panics: false,
            ..SupervisorOptions::default()
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Trigger::Signal(Signal::Terminate).exit_code(), 0);
        let fault = Fault::Rejection(anyhow::anyhow!("x"));
        assert_eq!(Trigger::Fault(fault).exit_code(), 1);
    }

    #[tokio::test]
    async fn prepare_failure_exits_one_without_server() {
        let sink = Arc::new(MemorySink::new(16));
        let supervisor = Supervisor::new(Log::new(sink.clone()), quiet());
        let code = supervisor
            .run(|_| Err(StartupError::Config(crate::config::ConfigError::MissingKey)))
            .await;
        assert_eq!(code, 1);

        let records = sink.records();
        let msgs: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
        assert_eq!(msgs, ["Process details.", "Failed to start."]);
        assert_eq!(records[1].level, Level::Fatal);
        assert_eq!(records[1].fields["error"]["message"], "--key must be specified");
    }
}
