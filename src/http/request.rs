//! Per-request identity and context.
//!
//! # Responsibilities
//! - Generate the correlation id (UUID v4) for every accepted request
//! - Capture method, url, version, headers and peer endpoint once
//! - Expose the context to handlers through request extensions
//!
//! # Design Decisions
//! - Context is built before any routing decision so every branch can log it
//! - Header names are lower-cased, repeated headers joined with `", "`
//! - The context is immutable once attached to the request

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::http::{HeaderName, Request, Version};
use uuid::Uuid;

/// Response header carrying the correlation id.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("request-id");

/// Globally unique correlation id for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote endpoint of the connection a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub address: String,
    pub family: &'static str,
    pub port: u16,
}

impl From<SocketAddr> for RemoteEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self {
            address: addr.ip().to_string(),
            family: family_of(&addr),
            port: addr.port(),
        }
    }
}

/// `"IPv4"` or `"IPv6"`.
pub fn family_of(addr: &SocketAddr) -> &'static str {
    match addr {
        SocketAddr::V4(_) => "IPv4",
        SocketAddr::V6(_) => "IPv6",
    }
}

/// Everything the router knows about a request before dispatching it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: RequestId,
    pub method: String,
    pub url: String,
    pub http_version: &'static str,
    pub headers: BTreeMap<String, String>,
    pub remote: RemoteEndpoint,
}

impl RequestContext {
    /// Capture the context of `request` under a fresh correlation id.
    pub fn capture<B>(request: &Request<B>, remote: SocketAddr) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in request.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        Self {
            id: RequestId::new(),
            method: request.method().as_str().to_string(),
            url,
            http_version: version_str(request.version()),
            headers,
            remote: remote.into(),
        }
    }

    /// Path used for route lookup: query string and fragment removed.
    pub fn pathname(&self) -> &str {
        pathname(&self.url)
    }

    /// Context attached to a request by the router, if any.
    pub fn of<B>(request: &Request<B>) -> Option<&RequestContext> {
        request.extensions().get::<RequestContext>()
    }
}

/// Strip query string and fragment from a request target.
pub fn pathname(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "unknown",
    }
}
