//! TLS-terminated HTTP request router.
//!
//! Dispatches requests by exact path and method, gives every request a
//! correlation id and a request-scoped structured logger, and supervises the
//! process so signals and faults end in a single graceful shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──TLS──▶ net (listener, rustls) ──▶ http::server (axum app)
//!                                                    │
//!                                                    ▼
//!                                   http::router ── routes (exact match)
//!                                        │               │
//!                                        ▼               ▼
//!                               observability       handler(request, log)
//!                           (log, serialize, sink)
//!
//!     SIGINT / SIGTERM / panic / failed task
//!         ──▶ lifecycle::supervisor ──▶ Server::close ──▶ exit code
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub mod cli;

pub use config::AppConfig;
pub use http::{RouteTable, Router, Server, ServerOptions};
pub use lifecycle::{Supervisor, SupervisorHandle};
pub use observability::Log;
