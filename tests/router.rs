//! End-to-end dispatch over TLS.

mod common;

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use serde_json::{json, Value};
use tls_router::http::{RequestContext, RouteTable};
use tls_router::observability::{Level, Log};

use common::{client, ok, records_for, start_server, url, wait_for};

async fn panics(_req: Request<Body>, _log: Log) -> anyhow::Result<Response> {
    panic!("Internal error")
}

async fn rejects(_req: Request<Body>, _log: Log) -> anyhow::Result<Response> {
    anyhow::bail!("Rejected")
}

async fn logs(req: Request<Body>, log: Log) -> anyhow::Result<Response> {
    let url = RequestContext::of(&req).map(|ctx| ctx.url.clone());
    log.log(Level::Info, json!({ "seen": url }), "Handler ran.");
    Ok(Response::new(Body::from("logged")))
}

fn routes() -> RouteTable {
    RouteTable::new()
        .get("/", ok)
        .route("/x", Method::POST, ok)
        .route("/multi", Method::POST, ok)
        .route("/multi", Method::DELETE, ok)
        .get("/panic", panics)
        .get("/reject", rejects)
        .get("/logs", logs)
}

#[tokio::test]
async fn get_root_is_200() {
    let (server, addr, _sink) = start_server(routes()).await;
    let response = client(addr).get(url(addr, "/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    server.close().await.unwrap();
}

#[tokio::test]
async fn unknown_path_is_404_json() {
    let (server, addr, sink) = start_server(routes()).await;
    let response = client(addr)
        .get(url(addr, "/missing?query=1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"error":"/missing not found"}"#);

    let record = wait_for(&sink, "Not found.").await;
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.fields["error"]["message"], "/missing not found");
    server.close().await.unwrap();
}

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let (server, addr, _sink) = start_server(routes()).await;
    let http = client(addr);

    let response = http.get(url(addr, "/x")).send().await.unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"], "POST");
    assert_eq!(response.text().await.unwrap(), r#"{"error":"GET not allowed for /x"}"#);

    let response = http.put(url(addr, "/multi")).send().await.unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"], "POST,DELETE");
    server.close().await.unwrap();
}

#[tokio::test]
async fn panicking_handler_is_500_and_logged_in_order() {
    let (server, addr, sink) = start_server(routes()).await;
    let response = client(addr).get(url(addr, "/panic")).send().await.unwrap();

    assert_eq!(response.status(), 500);
    let id = response.headers()["request-id"].to_str().unwrap().to_string();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Internal error" }));

    wait_for(&sink, "Response sent.").await;
    let msgs: Vec<String> = records_for(&sink, &id).into_iter().map(|r| r.msg).collect();
    assert_eq!(msgs, ["Request received.", "Internal server error.", "Response sent."]);
    server.close().await.unwrap();
}

#[tokio::test]
async fn rejecting_handler_is_500() {
    let (server, addr, sink) = start_server(routes()).await;
    let response = client(addr).get(url(addr, "/reject")).send().await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), r#"{"error":"Rejected"}"#);

    let record = wait_for(&sink, "Internal server error.").await;
    assert_eq!(record.fields["error"]["message"], "Rejected");
    server.close().await.unwrap();
}

#[tokio::test]
async fn handler_records_carry_the_request() {
    let (server, addr, sink) = start_server(routes()).await;
    let response = client(addr).get(url(addr, "/logs?a=b")).send().await.unwrap();
    let id = response.headers()["request-id"].to_str().unwrap().to_string();
    assert_eq!(response.text().await.unwrap(), "logged");

    wait_for(&sink, "Response sent.").await;
    let records = records_for(&sink, &id);
    let msgs: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
    assert_eq!(msgs, ["Request received.", "Handler ran.", "Response sent."]);

    let handler = &records[1];
    assert_eq!(handler.fields["seen"], "/logs?a=b");
    assert_eq!(handler.fields["request"]["method"], "GET");
    assert_eq!(handler.fields["request"]["connection"]["remoteAddress"], "127.0.0.1");

    let sent = &records[2];
    assert_eq!(sent.fields["response"]["statusCode"], 200);
    assert_eq!(sent.fields["response"]["statusMessage"], "OK");
    server.close().await.unwrap();
}

#[tokio::test]
async fn request_ids_are_unique_and_non_empty() {
    let (server, addr, _sink) = start_server(routes()).await;
    let http = client(addr);

    let mut seen = HashSet::new();
    for path in ["/", "/", "/missing", "/x", "/panic"] {
        let response = http.get(url(addr, path)).send().await.unwrap();
        let id = response.headers()["request-id"].to_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(seen.insert(id), "duplicate request id");
    }
    server.close().await.unwrap();
}
