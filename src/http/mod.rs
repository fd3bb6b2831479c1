//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection (axum-server + rustls)
//!     → server.rs (axum app, TraceLayer, connect info)
//!     → router.rs (correlation id, request logger, dispatch)
//!     → routes.rs (exact path → method → handler)
//!     → request.rs (context captured once, exposed via extensions)
//!     → response.rs (Request-Id, snapshot, finished signal)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod router;
pub mod routes;
pub mod server;

pub use request::{RequestContext, RequestId, REQUEST_ID};
pub use response::{json_error, ResponseSink, ResponseSummary};
pub use router::{DispatchError, Router, RouterConfig};
pub use routes::{Handler, HandlerFuture, Lookup, RouteError, RouteTable};
pub use server::{BoundAddress, Server, ServerError, ServerOptions, ServerState};
