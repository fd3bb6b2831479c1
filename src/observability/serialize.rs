//! Reduction of runtime objects to fixed-shape log records.
//!
//! Only the fields named on each record type are ever read; sockets, bodies
//! and arbitrary error internals never reach a log line.

use std::collections::BTreeMap;
use std::error::Error;

use serde::Serialize;
use serde_json::Value;

use crate::http::request::RequestContext;
use crate::http::response::ResponseSummary;

/// What is being serialized. The caller names the variant explicitly.
pub enum Subject<'a> {
    Error(&'a (dyn Error + 'static)),
    Request(&'a RequestContext),
    Response(&'a ResponseSummary),
    Value(Value),
}

#[derive(Serialize)]
struct ErrorRecord {
    message: String,
    stack: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestRecord<'a> {
    id: &'a str,
    method: &'a str,
    url: &'a str,
    http_version: &'a str,
    headers: &'a BTreeMap<String, String>,
    connection: ConnectionRecord<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionRecord<'a> {
    remote_address: &'a str,
    remote_family: &'a str,
    remote_port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseRecord<'a> {
    id: &'a str,
    status_message: &'a str,
    status_code: u16,
    headers: &'a BTreeMap<String, String>,
}

/// Serialize `subject` into a plain JSON value.
pub fn serialize(subject: Subject<'_>) -> Value {
    match subject {
        Subject::Error(error) => to_value(&ErrorRecord {
            message: error.to_string(),
            stack: stack_of(error),
        }),
        Subject::Request(ctx) => to_value(&RequestRecord {
            id: ctx.id.as_str(),
            method: &ctx.method,
            url: &ctx.url,
            http_version: ctx.http_version,
            headers: &ctx.headers,
            connection: ConnectionRecord {
                remote_address: &ctx.remote.address,
                remote_family: ctx.remote.family,
                remote_port: ctx.remote.port,
            },
        }),
        Subject::Response(summary) => to_value(&ResponseRecord {
            id: summary.id.as_str(),
            status_message: summary.status_message(),
            status_code: summary.status.as_u16(),
            headers: &summary.headers,
        }),
        Subject::Value(value) => value,
    }
}

/// Shorthand for `serialize(Subject::Error(error))`.
pub fn error(error: &(dyn Error + 'static)) -> Value {
    serialize(Subject::Error(error))
}

/// Message followed by its source chain, one cause per line.
fn stack_of(error: &(dyn Error + 'static)) -> String {
    let mut stack = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        stack.push_str("\n    caused by: ");
        stack.push_str(&cause.to_string());
        source = cause.source();
    }
    stack
}

fn to_value<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestId;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn keys(value: &Value) -> Vec<&str> {
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn error_has_message_and_stack_only() {
        let err = Outer(std::io::Error::other("inner"));
        let value = serialize(Subject::Error(&err));
        assert_eq!(keys(&value), ["message", "stack"]);
        assert_eq!(value["message"], json!("outer"));
        assert_eq!(value["stack"], json!("outer\n    caused by: inner"));
    }

    #[test]
    fn request_has_exact_key_set() {
        let req = Request::builder()
            .method("GET")
            .uri("/?q=1")
            .header("accept", "*/*")
            .body(Body::empty())
            .unwrap();
        let ctx = RequestContext::capture(&req, "10.0.0.1:4000".parse().unwrap());
        let value = serialize(Subject::Request(&ctx));

        assert_eq!(
            keys(&value),
            ["connection", "headers", "httpVersion", "id", "method", "url"]
        );
        assert_eq!(
            keys(&value["connection"]),
            ["remoteAddress", "remoteFamily", "remotePort"]
        );
        assert_eq!(value["id"], json!(ctx.id.as_str()));
        assert_eq!(value["url"], json!("/?q=1"));
        assert_eq!(value["headers"]["accept"], json!("*/*"));
        assert_eq!(value["connection"]["remotePort"], json!(4000));
    }

    #[test]
    fn response_has_exact_key_set() {
        let summary = ResponseSummary {
            id: RequestId::new(),
            status: StatusCode::METHOD_NOT_ALLOWED,
            headers: BTreeMap::from([("allow".to_string(), "POST".to_string())]),
        };
        let value = serialize(Subject::Response(&summary));
        assert_eq!(keys(&value), ["headers", "id", "statusCode", "statusMessage"]);
        assert_eq!(value["statusCode"], json!(405));
        assert_eq!(value["statusMessage"], json!("Method Not Allowed"));
        assert_eq!(value["headers"]["allow"], json!("POST"));
    }

    #[test]
    fn other_values_pass_through() {
        let value = json!({ "a": 1 });
        assert_eq!(serialize(Subject::Value(value.clone())), value);
    }
}
