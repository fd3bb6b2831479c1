//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured interface + port
//!     → listener.rs (resolve, bind eagerly, hand over std listener)
//!     → tls.rs (PEM material → rustls ServerConfig)
//!     → axum-server rustls acceptor (handshake, connection accounting)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind errors surface from `listen`, never from the background serve task
//! - TLS is mandatory; there is no plaintext listener

pub mod listener;
pub mod tls;
