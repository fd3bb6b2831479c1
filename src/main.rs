use std::process::ExitCode;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;

use tls_router::observability::Log;
use tls_router::RouteTable;

async fn index(_request: Request<Body>, _log: Log) -> anyhow::Result<Response> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

#[tokio::main]
async fn main() -> ExitCode {
    let routes = RouteTable::new().get("/", index);
    tls_router::cli::run(routes).await
}
