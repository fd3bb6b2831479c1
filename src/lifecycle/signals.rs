//! OS signal forwarding.
//!
//! SIGINT and SIGTERM are turned into [`Trigger::Signal`] messages on the
//! supervisor channel. Listeners are registered synchronously so a signal
//! arriving right after `install` returns is never lost.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::supervisor::Trigger;

/// Termination signals the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
        }
    }
}

/// Register signal listeners and forward deliveries to `tx`.
#[cfg(unix)]
pub fn install(tx: mpsc::UnboundedSender<Trigger>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => break,
            };
            tracing::debug!(signal = received.name(), "signal delivered");
            if tx.send(Trigger::Signal(received)).is_err() {
                break;
            }
        }
    }))
}

/// Register signal listeners and forward deliveries to `tx`.
#[cfg(not(unix))]
pub fn install(tx: mpsc::UnboundedSender<Trigger>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(Trigger::Signal(Signal::Interrupt)).is_err() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names() {
        assert_eq!(Signal::Interrupt.name(), "SIGINT");
        assert_eq!(Signal::Terminate.name(), "SIGTERM");
    }
}
