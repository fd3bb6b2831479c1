//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs → startup.rs):
//!     Install hooks → Process details → Prepare config → Create server → Listen
//!
//! Triggers (signals.rs, faults.rs):
//!     SIGINT/SIGTERM → Trigger::Signal   (exit 0)
//!     Uncaught panic / failed task → Trigger::Fault (exit 1)
//!
//! Shutdown (shutdown.rs):
//!     First trigger → Stop accepting → Drain connections → Exit code
//! ```
//!
//! # Design Decisions
//! - Hooks are installed before the server so early faults are still seen
//! - Shutdown runs once; later triggers are logged and dropped
//! - Draining is bounded by the server's drain timeout

pub mod faults;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use faults::{Fault, FaultReporter, HandlerPanic};
pub use shutdown::{Phase, ShutdownState};
pub use signals::Signal;
pub use startup::{ProcessDetails, Startup, StartupError};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorOptions, Trigger, EXIT_FAILURE, EXIT_OK};
