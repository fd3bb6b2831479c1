//! Diagnostic logging via `tracing`.
//!
//! Operator diagnostics (tower-http spans, listener and dispatch events, and
//! the `tracing` log format) go to stderr. Stdout is reserved for the JSON
//! record stream.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "tls_router=info,tower_http=warn";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
