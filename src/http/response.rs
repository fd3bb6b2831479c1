//! Response sink and completion signal.
//!
//! # Responsibilities
//! - Stamp the `Request-Id` header on every outgoing response
//! - Snapshot the response head for logging once it is final
//! - Fire a single "finished" callback when the body has been handed off
//! - Build the JSON error responses used by the router
//!
//! # Design Decisions
//! - `ResponseSink::send` consumes the sink, so a second write cannot compile
//! - The finished callback lives in a drop guard: end of stream, body error
//!   and client abort all release it, and it can only run once
//! - Body size hints pass through untouched so `content-length` survives

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::response::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use super::request::{RequestId, REQUEST_ID};

/// JSON content type for router-generated bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Response head as it was finalized for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub id: RequestId,
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
}

impl ResponseSummary {
    fn from_parts(id: &RequestId, parts: &Parts) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &parts.headers {
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
            id: id.clone(),
            status: parts.status,
            headers,
        }
    }

    /// Canonical reason phrase, empty for unregistered codes.
    pub fn status_message(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }
}

type FinishCallback = Box<dyn FnOnce(&ResponseSummary) + Send + 'static>;

/// Write-once exit point for the response of one request.
pub struct ResponseSink {
    id: RequestId,
    on_finish: FinishCallback,
}

impl ResponseSink {
    /// Create a sink that runs `on_finish` exactly once after the response is out.
    pub fn new(id: RequestId, on_finish: impl FnOnce(&ResponseSummary) + Send + 'static) -> Self {
        Self {
            id,
            on_finish: Box::new(on_finish),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Finalize `response` and attach the completion signal to its body.
    pub fn send(self, response: Response) -> Response {
        let (mut parts, body) = response.into_parts();
        if let Ok(value) = HeaderValue::from_str(self.id.as_str()) {
            parts.headers.insert(REQUEST_ID, value);
        }
        let summary = ResponseSummary::from_parts(&self.id, &parts);
        let guard = FinishGuard {
            summary,
            on_finish: Some(self.on_finish),
        };
        let body = Body::new(FinishedBody {
            inner: body,
            guard: Some(guard),
        });
        Response::from_parts(parts, body)
    }
}

struct FinishGuard {
    summary: ResponseSummary,
    on_finish: Option<FinishCallback>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(&self.summary);
        }
    }
}

/// Body wrapper releasing the finish guard once the inner body is exhausted.
struct FinishedBody {
    inner: Body,
    guard: Option<FinishGuard>,
}

impl HttpBody for FinishedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => {
                this.guard.take();
            }
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                this.guard.take();
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// `{"error": message}` with a JSON content type.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    let body = serde_json::to_vec(&serde_json::json!({ "error": message }))
        .unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}
