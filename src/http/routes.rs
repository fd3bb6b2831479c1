//! Route table: exact path → ordered method map → handler.
//!
//! The table is assembled with the builder methods below and then handed to
//! the router, which keeps it behind an `Arc` and never mutates it again.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::observability::Log;

/// Future returned by every handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Response>>;

/// A request handler.
///
/// Handlers receive the request (with its [`RequestContext`] in the
/// extensions) and a logger already scoped to the request. Returning `Err`
/// or panicking yields a 500.
///
/// [`RequestContext`]: crate::http::request::RequestContext
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request<Body>, log: Log) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Body>, Log) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    fn call(&self, request: Request<Body>, log: Log) -> HandlerFuture {
        Box::pin(self(request, log))
    }
}

/// Rejected route registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route path must start with '/': {0}")]
    RelativePath(String),

    #[error("route path must not contain a query or fragment: {0}")]
    QueryInPath(String),
}

/// Result of looking a request up in the table.
pub enum Lookup<'a> {
    Found(&'a Arc<dyn Handler>),
    /// The path exists but not for this method; methods in registration order.
    MethodNotAllowed { allow: Vec<&'a str> },
    NotFound,
}

struct PathRoutes {
    path: String,
    methods: Vec<(Method, Arc<dyn Handler>)>,
}

/// Flat, exact-match route table.
#[derive(Default)]
pub struct RouteTable {
    paths: Vec<PathRoutes>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// Registering an existing (path, method) pair replaces the handler and
    /// keeps the method's original position in the `Allow` list.
    pub fn route(mut self, path: impl Into<String>, method: Method, handler: impl Handler) -> Self {
        let path = path.into();
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let entry = match self.paths.iter().position(|p| p.path == path) {
            Some(idx) => &mut self.paths[idx],
            None => {
                self.paths.push(PathRoutes {
                    path,
                    methods: Vec::new(),
                });
                let last = self.paths.len() - 1;
                &mut self.paths[last]
            }
        };

        match entry.methods.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = handler,
            None => entry.methods.push((method, handler)),
        }
        self
    }

    /// Shorthand for `route(path, Method::GET, handler)`.
    pub fn get(self, path: impl Into<String>, handler: impl Handler) -> Self {
        self.route(path, Method::GET, handler)
    }

    /// Shorthand for `route(path, Method::POST, handler)`.
    pub fn post(self, path: impl Into<String>, handler: impl Handler) -> Self {
        self.route(path, Method::POST, handler)
    }

    /// Check every registered path is an absolute path without query or fragment.
    pub fn validate(&self) -> Result<(), RouteError> {
        for entry in &self.paths {
            if !entry.path.starts_with('/') {
                return Err(RouteError::RelativePath(entry.path.clone()));
            }
            if entry.path.contains(['?', '#']) {
                return Err(RouteError::QueryInPath(entry.path.clone()));
            }
        }
        Ok(())
    }

    /// Exact-match lookup. No normalization of `path` is performed.
    pub fn lookup(&self, path: &str, method: &Method) -> Lookup<'_> {
        let Some(entry) = self.paths.iter().find(|p| p.path == path) else {
            return Lookup::NotFound;
        };
        match entry.methods.iter().find(|(m, _)| m == method) {
            Some((_, handler)) => Lookup::Found(handler),
            None => Lookup::MethodNotAllowed {
                allow: entry.methods.iter().map(|(m, _)| m.as_str()).collect(),
            },
        }
    }

    /// Number of registered (path, method) pairs.
    pub fn len(&self) -> usize {
        self.paths.iter().map(|p| p.methods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in &self.paths {
            let methods: Vec<&str> = entry.methods.iter().map(|(m, _)| m.as_str()).collect();
            map.entry(&entry.path, &methods);
        }
        map.finish()
    }
}
