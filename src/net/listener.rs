//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured interface (IP literal or host name) and port
//! - Bind eagerly so address-in-use and permission errors surface to the caller
//! - Hand the bound socket over as a std listener for the TLS acceptor

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::{lookup_host, TcpListener};

/// Interface used when none is configured.
pub const DEFAULT_INTERFACE: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to resolve interface {interface:?}")]
    Resolve {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interface {interface:?} resolved to no addresses")]
    NoAddress { interface: String },

    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Candidate socket addresses for `port` on `interface`.
///
/// `None` means all interfaces. IP literals resolve without a lookup, host
/// names go through the system resolver.
pub async fn resolve(port: u16, interface: Option<&str>) -> Result<Vec<SocketAddr>, ListenerError> {
    let Some(host) = interface else {
        return Ok(vec![SocketAddr::new(DEFAULT_INTERFACE, port)]);
    };

    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            interface: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ListenerError::NoAddress {
            interface: host.to_string(),
        });
    }
    Ok(addrs)
}

/// Bind the first of `addrs` that accepts, and convert it for the acceptor.
///
/// Returns the std listener (non-blocking) together with the address the
/// kernel actually assigned, which differs from the requested one when port
/// 0 is used. When every candidate fails, the last bind error is returned.
pub async fn bind(addrs: &[SocketAddr]) -> Result<(std::net::TcpListener, SocketAddr), ListenerError> {
    let mut last = None;
    for &addr in addrs {
        match bind_one(addr).await {
            Ok(bound) => return Ok(bound),
            Err(err) => {
                tracing::debug!(address = %addr, error = %err, "bind attempt failed");
                last = Some(err);
            }
        }
    }
    Err(last.unwrap_or(ListenerError::NoAddress {
        interface: String::new(),
    }))
}

async fn bind_one(addr: SocketAddr) -> Result<(std::net::TcpListener, SocketAddr), ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };

    let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;
    let std_listener = listener.into_std().map_err(bind_err)?;

    tracing::debug!(address = %local_addr, "listener bound");
    Ok((std_listener, local_addr))
}
