//! Shutdown coordination.
//!
//! The process shuts down at most once. The first trigger moves the state
//! from `Running` to `ShuttingDown`; every later trigger observes that and is
//! ignored. Draining the server is the only work done during shutdown.

use std::sync::atomic::{AtomicU8, Ordering};

use serde_json::json;

use crate::http::Server;
use crate::observability::{serialize, Level, Log};

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Running = 0,
    ShuttingDown = 1,
    Stopped = 2,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Running,
            1 => Phase::ShuttingDown,
            _ => Phase::Stopped,
        }
    }
}

/// Single-shot shutdown latch.
#[derive(Debug)]
pub struct ShutdownState {
    phase: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Running as u8),
        }
    }

    /// Claim the shutdown. Returns `false` if another trigger already did.
    pub fn begin(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Running as u8,
                Phase::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn finish(&self) {
        self.phase.store(Phase::Stopped as u8, Ordering::Release);
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop `server`, logging the connection count before and after.
///
/// A close failure is logged and otherwise ignored; shutdown always proceeds.
pub async fn stop_server(log: &Log, server: &Server) {
    log.log(
        Level::Info,
        json!({ "connections": server.connections().await }),
        "Stopping server.",
    );
    if let Err(err) = server.close().await {
        log.log(
            Level::Error,
            json!({ "error": serialize::error(&err) }),
            "Failed to close server.",
        );
    }
    log.log(
        Level::Info,
        json!({ "connections": server.connections().await }),
        "Server stopped.",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_single_shot() {
        let state = ShutdownState::new();
        assert_eq!(state.phase(), Phase::Running);
        assert!(state.begin());
        assert!(!state.begin());
        assert_eq!(state.phase(), Phase::ShuttingDown);
        state.finish();
        assert_eq!(state.phase(), Phase::Stopped);
        assert!(!state.begin());
    }

    #[test]
    fn concurrent_begin_has_one_winner() {
        let state = std::sync::Arc::new(ShutdownState::new());
        let winners: usize = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.begin())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
