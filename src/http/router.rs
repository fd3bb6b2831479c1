//! Request dispatch.
//!
//! # Responsibilities
//! - Give every request a correlation id and a request-scoped logger
//! - Resolve the handler by exact path and method
//! - Map missing routes and handler failures to JSON error responses
//! - Log received / error / sent records in that order for each request
//! - Log a terminal "Request aborted." record when dispatch is dropped early
//!
//! # Design Decisions
//! - `route` is infallible: every outcome is a response
//! - Handler panics and `Err` results share one recovery boundary
//! - The "sent" record is driven by the response body, not by dispatch

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::Response;
use serde_json::json;

use super::request::RequestContext;
use super::response::{json_error, ResponseSink};
use super::routes::{Handler, Lookup, RouteTable};
use crate::lifecycle::faults::{recover, Recover};
use crate::observability::{serialize, Level, Log, Subject};

/// Router-level settings.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Parent logger; `Log::disabled()` when logging is off.
    pub log: Log,
}

/// Dispatch failures that never reach a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("{method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("request for {path} aborted before a response was produced")]
    Aborted { path: String },
}

/// Logs "Request aborted." unless disarmed before it is dropped.
///
/// Covers dispatch futures dropped mid-flight, e.g. when the drain deadline
/// force-closes a connection while its handler is still running.
struct AbortGuard {
    log: Log,
    path: Option<String>,
}

impl AbortGuard {
    fn new(log: &Log, path: &str) -> Self {
        Self {
            log: log.clone(),
            path: Some(path.to_string()),
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let err = DispatchError::Aborted { path };
            self.log.log(
                Level::Error,
                json!({ "error": serialize::error(&err) }),
                "Request aborted.",
            );
        }
    }
}

/// Exact-match request router.
#[derive(Clone)]
pub struct Router {
    routes: Arc<RouteTable>,
    log: Log,
}

impl Router {
    pub fn new(config: RouterConfig, routes: RouteTable) -> Self {
        Self {
            routes: Arc::new(routes),
            log: config.log,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatch one request and produce its single response.
    pub async fn route(&self, mut request: Request<Body>, remote: SocketAddr) -> Response {
        let ctx = RequestContext::capture(&request, remote);
        let id = ctx.id.clone();
        let log = self
            .log
            .child(json!({ "request": serialize::serialize(Subject::Request(&ctx)) }));
        log.info("Request received.");

        let sent_log = log.clone();
        let sink = ResponseSink::new(id.clone(), move |summary| {
            sent_log.log(
                Level::Info,
                json!({ "response": serialize::serialize(Subject::Response(summary)) }),
                "Response sent.",
            );
        });

        let path = ctx.pathname().to_string();
        request.extensions_mut().insert(ctx);
        let aborted = AbortGuard::new(&log, &path);

        let response = match self.routes.lookup(&path, request.method()) {
            Lookup::NotFound => {
                let err = DispatchError::NotFound { path };
                log.log(Level::Error, json!({ "error": serialize::error(&err) }), "Not found.");
                json_error(StatusCode::NOT_FOUND, &err.to_string())
            }
            Lookup::MethodNotAllowed { allow } => {
                let err = DispatchError::MethodNotAllowed {
                    method: request.method().as_str().to_string(),
                    path,
                };
                log.log(
                    Level::Error,
                    json!({ "error": serialize::error(&err) }),
                    "Method not allowed.",
                );
                let mut response = json_error(StatusCode::METHOD_NOT_ALLOWED, &err.to_string());
                if let Ok(value) = HeaderValue::from_str(&allow.join(",")) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            Lookup::Found(handler) => match invoke(&**handler, request, log.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    log.log(
                        Level::Error,
                        json!({ "error": serialize::error(&*err) }),
                        "Internal server error.",
                    );
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
                }
            },
        };

        aborted.disarm();
        tracing::debug!(request_id = %id, status = response.status().as_u16(), "request dispatched");
        sink.send(response)
    }
}

/// Run a handler inside the recovery boundary.
async fn invoke(handler: &dyn Handler, request: Request<Body>, log: Log) -> anyhow::Result<Response> {
    let future = recover(|| handler.call(request, log))?;
    Recover::new(future).await?
}
