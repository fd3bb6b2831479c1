//! HTTPS server.
//!
//! # Responsibilities
//! - Validate key and certificate material before any I/O
//! - Wire the request [`Router`] into an axum app behind the rustls acceptor
//! - Bind, report the bound address and live connection count
//! - Close with a bounded graceful drain
//!
//! # Design Decisions
//! - The serve loop runs on its own task; `listen` returns once the socket is bound
//! - Connection accounting comes from the axum-server [`Handle`]
//! - A closed server may listen again on a fresh socket

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::Response;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use super::request::family_of;
use super::router::{Router, RouterConfig};
use super::routes::{RouteError, RouteTable};
use crate::net::listener::{self, ListenerError};
use crate::net::tls::{self, TlsError};
use crate::observability::Log;

/// Time in-flight connections get to finish once `close` is called.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Construction options for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// PEM-encoded private key.
    pub key: Option<Vec<u8>>,
    /// PEM-encoded certificate chain.
    pub cert: Option<Vec<u8>>,
    pub log: Log,
    pub drain_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            key: None,
            cert: None,
            log: Log::disabled(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Error type for server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("key must be defined")]
    MissingKey,

    #[error("cert must be defined")]
    MissingCert,

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("server is already listening")]
    AlreadyListening,

    #[error("server terminated")]
    Serve(#[source] std::io::Error),
}

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    Closing,
    Closed,
}

/// Address the server is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundAddress {
    pub address: String,
    pub family: &'static str,
    pub port: u16,
}

impl From<SocketAddr> for BoundAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            address: addr.ip().to_string(),
            family: family_of(&addr),
            port: addr.port(),
        }
    }
}

struct Inner {
    state: ServerState,
    addr: Option<SocketAddr>,
    handle: Option<Handle>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

/// TLS-terminated HTTP server dispatching through a [`Router`].
pub struct Server {
    app: axum::Router,
    tls: RustlsConfig,
    drain_timeout: Duration,
    inner: Mutex<Inner>,
}

impl Server {
    /// Validate options and build the server. No socket is opened.
    pub fn new(options: ServerOptions, routes: RouteTable) -> Result<Self, ServerError> {
        let key = options
            .key
            .filter(|k| !k.is_empty())
            .ok_or(ServerError::MissingKey)?;
        let cert = options
            .cert
            .filter(|c| !c.is_empty())
            .ok_or(ServerError::MissingCert)?;
        routes.validate()?;

        let config = tls::build_server_config(&cert, &key)?;
        let router = Router::new(RouterConfig { log: options.log }, routes);

        Ok(Self {
            app: build_app(router),
            tls: tls::acceptor_config(config),
            drain_timeout: options.drain_timeout,
            inner: Mutex::new(Inner {
                state: ServerState::Created,
                addr: None,
                handle: None,
                task: None,
            }),
        })
    }

    /// Bind `host:port` (all interfaces by default) and start accepting.
    ///
    /// Resolves once the socket is bound; port `0` picks a free port.
    pub async fn listen(&self, port: u16, host: Option<&str>) -> Result<(), ServerError> {
        let previous = {
            let mut inner = self.lock();
            if matches!(inner.state, ServerState::Listening | ServerState::Closing) {
                return Err(ServerError::AlreadyListening);
            }
            std::mem::replace(&mut inner.state, ServerState::Listening)
        };

        match self.start(port, host).await {
            Ok((addr, handle, task)) => {
                let mut inner = self.lock();
                inner.addr = Some(addr);
                inner.handle = Some(handle);
                inner.task = Some(task);
                tracing::debug!(address = %addr, "server listening");
                Ok(())
            }
            Err(err) => {
                self.lock().state = previous;
                Err(err)
            }
        }
    }

    async fn start(
        &self,
        port: u16,
        host: Option<&str>,
    ) -> Result<(SocketAddr, Handle, JoinHandle<std::io::Result<()>>), ServerError> {
        let addrs = listener::resolve(port, host).await?;
        let (std_listener, local_addr) = listener::bind(&addrs).await?;

        let handle = Handle::new();
        let serve = axum_server::tls_rustls::from_tcp_rustls(std_listener, self.tls.clone())
            .handle(handle.clone())
            .serve(
                self.app
                    .clone()
                    .into_make_service_with_connect_info::<SocketAddr>(),
            );
        let task = tokio::spawn(serve);

        match handle.listening().await {
            Some(_) => Ok((local_addr, handle, task)),
            None => {
                let err = match task.await {
                    Ok(Err(err)) => err,
                    Ok(Ok(())) => std::io::Error::other("server exited before listening"),
                    Err(join) => std::io::Error::other(join),
                };
                Err(ServerError::Serve(err))
            }
        }
    }

    /// Bound address, `None` unless listening.
    pub fn address(&self) -> Option<BoundAddress> {
        self.lock().addr.map(BoundAddress::from)
    }

    /// Raw bound socket address, `None` unless listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().addr
    }

    pub fn state(&self) -> ServerState {
        self.lock().state
    }

    /// Open connections, including idle keep-alive ones.
    ///
    /// After `close` this still reads the drained handle, so it reports
    /// whatever survived the drain.
    pub async fn connections(&self) -> usize {
        self.lock()
            .handle
            .as_ref()
            .map(Handle::connection_count)
            .unwrap_or(0)
    }

    /// Stop accepting and drain.
    ///
    /// Idle connections close immediately, in-flight requests get up to the
    /// drain timeout. Resolves `Ok` without doing anything when not listening.
    pub async fn close(&self) -> Result<(), ServerError> {
        let (handle, task) = {
            let mut inner = self.lock();
            match (inner.handle.clone(), inner.task.take()) {
                (Some(handle), Some(task)) => {
                    inner.state = ServerState::Closing;
                    (handle, task)
                }
                _ => return Ok(()),
            }
        };

        handle.graceful_shutdown(Some(self.drain_timeout));
        let outcome = task.await;

        {
            let mut inner = self.lock();
            inner.state = ServerState::Closed;
            inner.addr = None;
        }

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ServerError::Serve(err)),
            Err(join) => Err(ServerError::Serve(std::io::Error::other(join))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Axum app routing every request through `router`.
pub fn build_app(router: Router) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .with_state(router)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(
    State(router): State<Router>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    router.route(request, remote).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    const CERT: &[u8] = include_bytes!("../../tests/fixtures/server.crt");
    const KEY: &[u8] = include_bytes!("../../tests/fixtures/server.key");

    fn options() -> ServerOptions {
        ServerOptions {
            key: Some(KEY.to_vec()),
            cert: Some(CERT.to_vec()),
            ..ServerOptions::default()
        }
    }

    async fn ok(_req: Request<Body>, _log: Log) -> anyhow::Result<Response> {
        Ok(Response::new(Body::from("ok")))
    }

    #[test]
    fn missing_key_is_rejected() {
        let opts = ServerOptions { key: None, ..options() };
        let err = Server::new(opts, RouteTable::new()).err().unwrap();
        assert!(matches!(err, ServerError::MissingKey));
        assert_eq!(err.to_string(), "key must be defined");
    }

    #[test]
    fn empty_cert_is_rejected() {
        let opts = ServerOptions { cert: Some(Vec::new()), ..options() };
        let err = Server::new(opts, RouteTable::new()).err().unwrap();
        assert_eq!(err.to_string(), "cert must be defined");
    }

    #[test]
    fn unparseable_material_is_tls_error() {
        let opts = ServerOptions { cert: Some(b"garbage".to_vec()), ..options() };
        assert!(matches!(
            Server::new(opts, RouteTable::new()),
            Err(ServerError::Tls(_))
        ));
    }

    #[tokio::test]
    async fn fresh_server_reports_nothing() {
        let server = Server::new(options(), RouteTable::new()).unwrap();
        assert_eq!(server.state(), ServerState::Created);
        assert_eq!(server.address(), None);
        assert_eq!(server.connections().await, 0);
        server.close().await.unwrap();
        assert_eq!(server.state(), ServerState::Created);
    }

    #[tokio::test]
    async fn app_dispatches_with_connect_info() {
        let router = Router::new(RouterConfig::default(), RouteTable::new().get("/", ok));
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("127.0.0.1:1".parse().unwrap()));

        let response = build_app(router).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("request-id"));
    }

    #[tokio::test]
    async fn listen_close_cycle() {
        let server = Server::new(options(), RouteTable::new()).unwrap();
        server.listen(0, Some("127.0.0.1")).await.unwrap();

        let bound = server.address().unwrap();
        assert_eq!(bound.address, "127.0.0.1");
        assert_eq!(bound.family, "IPv4");
        assert_ne!(bound.port, 0);
        assert!(matches!(
            server.listen(0, Some("127.0.0.1")).await,
            Err(ServerError::AlreadyListening)
        ));

        server.close().await.unwrap();
        assert_eq!(server.state(), ServerState::Closed);
        assert_eq!(server.address(), None);
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_server_keeps_connection_accounting() {
        let server = Server::new(options(), RouteTable::new()).unwrap();
        server.listen(0, Some("127.0.0.1")).await.unwrap();
        server.close().await.unwrap();

        assert!(server.lock().handle.is_some());
        assert_eq!(server.connections().await, 0);
    }
}
