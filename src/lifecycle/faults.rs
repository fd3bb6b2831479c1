//! Process faults and the per-request recovery boundary.
//!
//! # Responsibilities
//! - Catch panics raised while a request handler is constructed or polled
//! - Forward panics raised anywhere else to the supervisor as process faults
//! - Report failed detached tasks (unobserved errors) as process faults
//!
//! # Design Decisions
//! - The panic hook is process-wide; a thread-local depth counter tells it
//!   whether the panicking code is running inside a recovery boundary
//! - Panics inside a boundary are silent here, the router logs them
//! - Faults travel over the same channel as signals so shutdown has one entry

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::supervisor::Trigger;

thread_local! {
    static BOUNDARY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether the current thread is executing inside a recovery boundary.
pub fn inside_boundary() -> bool {
    BOUNDARY_DEPTH.with(|depth| depth.get() > 0)
}

struct BoundaryGuard;

impl BoundaryGuard {
    fn enter() -> Self {
        BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        BoundaryGuard
    }
}

impl Drop for BoundaryGuard {
    fn drop(&mut self) {
        BOUNDARY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// A panic caught inside a recovery boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Run `f` inside a recovery boundary.
pub fn recover<T>(f: impl FnOnce() -> T) -> Result<T, HandlerPanic> {
    let _guard = BoundaryGuard::enter();
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(HandlerPanic::from_payload)
}

/// Future adapter polling `inner` inside a recovery boundary.
pub struct Recover<F> {
    inner: F,
}

impl<F> Recover<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: Future + Unpin> Future for Recover<F> {
    type Output = Result<F::Output, HandlerPanic>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        match recover(|| Pin::new(inner).poll(cx)) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(panic) => Poll::Ready(Err(panic)),
        }
    }
}

/// A failure outside any request's recovery boundary.
#[derive(Debug)]
pub enum Fault {
    /// Panic raised outside a recovery boundary.
    Panic {
        message: String,
        location: Option<String>,
    },
    /// Detached task finished with an error nobody awaited.
    Rejection(anyhow::Error),
}

/// Panic surfaced as an error value for logging.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UncaughtPanic {
    pub message: String,
    pub location: Option<String>,
}

/// Handle for reporting faults to the supervisor.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl FaultReporter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self { tx }
    }

    /// Report a fault. Ignored once the supervisor has stopped listening.
    pub fn report(&self, fault: Fault) {
        let _ = self.tx.send(Trigger::Fault(fault));
    }

    /// Spawn a detached task; an `Err` outcome is reported as a rejection.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let reporter = self.clone();
        tokio::spawn(async move {
            if let Err(error) = task.await {
                reporter.report(Fault::Rejection(error));
            }
        })
    }
}

/// Install the process-wide panic hook forwarding uncaught panics to `reporter`.
///
/// Panics outside a recovery boundary still reach the previously installed
/// hook after being reported.
pub fn install_panic_hook(reporter: FaultReporter) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if inside_boundary() {
            return;
        }
        reporter.report(Fault::Panic {
            message: panic_message(info.payload()),
            location: info.location().map(|l| l.to_string()),
        });
        previous(info);
    }));
}
