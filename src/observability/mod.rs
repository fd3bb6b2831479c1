//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router / Server / Supervisor
//!     → log.rs (leveled records, child loggers with merged context)
//!     → serialize.rs (request / response / error → fixed-shape JSON)
//!     → sink.rs (JSON lines on stdout, tracing bridge, in-memory ring)
//!
//! Internal diagnostics:
//!     → logging.rs (tracing subscriber on stderr)
//! ```
//!
//! # Design Decisions
//! - One JSON record per line so stdout stays machine-parseable
//! - Correlation data flows through child loggers, never through call sites
//! - A logger without a sink is a null object, not an `Option`
//! - Writing a record can never fail the caller

pub mod log;
pub mod logging;
pub mod serialize;
pub mod sink;

pub use log::{Fields, Level, Log, Record};
pub use serialize::{serialize, Subject};
pub use sink::{JsonLineSink, LogSink, MemorySink, NullSink, TracingSink};
