//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tls_router::http::{RouteTable, Server, ServerOptions};
use tls_router::observability::{Log, MemorySink, Record};

pub const CA: &[u8] = include_bytes!("../fixtures/ca.crt");
pub const CERT: &[u8] = include_bytes!("../fixtures/server.crt");
pub const KEY: &[u8] = include_bytes!("../fixtures/server.key");

/// Absolute path of a fixture file.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Server options carrying the fixture key pair.
pub fn options(log: Log) -> ServerOptions {
    ServerOptions {
        key: Some(KEY.to_vec()),
        cert: Some(CERT.to_vec()),
        log,
        drain_timeout: Duration::from_secs(2),
    }
}

/// HTTPS client trusting the fixture CA and resolving `localhost` to `addr`.
pub fn client(addr: SocketAddr) -> reqwest::Client {
    let ca = reqwest::Certificate::from_pem(CA).unwrap();
    reqwest::Client::builder()
        .add_root_certificate(ca)
        .resolve("localhost", addr)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// `https://localhost:<port><path>`.
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("https://localhost:{}{}", addr.port(), path)
}

/// Handler answering 200 with an empty body.
pub async fn ok(_req: Request<Body>, _log: Log) -> anyhow::Result<Response> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// Start a server on an ephemeral loopback port, recording into a memory sink.
pub async fn start_server(routes: RouteTable) -> (Server, SocketAddr, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(1024));
    let server = Server::new(options(Log::new(sink.clone())), routes).unwrap();
    server.listen(0, Some("127.0.0.1")).await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr, sink)
}

/// Poll `sink` until a record with `msg` shows up.
pub async fn wait_for(sink: &MemorySink, msg: &str) -> Record {
    for _ in 0..200 {
        if let Some(record) = sink.records().into_iter().find(|r| r.msg == msg) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no {msg:?} record; saw {:?}", messages(sink));
}

/// Messages of all buffered records, oldest first.
pub fn messages(sink: &MemorySink) -> Vec<String> {
    sink.records().into_iter().map(|r| r.msg).collect()
}

/// Records belonging to the request with correlation id `id`.
pub fn records_for(sink: &MemorySink, id: &str) -> Vec<Record> {
    sink.records()
        .into_iter()
        .filter(|r| r.fields.get("request").and_then(|v| v["id"].as_str()) == Some(id))
        .collect()
}
