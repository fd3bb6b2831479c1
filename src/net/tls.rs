//! TLS server configuration from in-memory PEM material.

use std::io::BufReader;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::ring;
use rustls::ServerConfig;

/// Error building the TLS acceptor configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to parse certificate chain")]
    Certificates(#[source] std::io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificates,

    #[error("failed to parse private key")]
    PrivateKey(#[source] std::io::Error),

    #[error("no private key found in PEM data")]
    NoPrivateKey,

    #[error("rustls rejected the configuration")]
    Rustls(#[from] rustls::Error),
}

/// Build a rustls [`ServerConfig`] from PEM-encoded certificate chain and key.
///
/// The ring provider is selected explicitly so the process never depends on
/// a globally installed default provider.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Certificates)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
        .map_err(TlsError::PrivateKey)?
        .ok_or(TlsError::NoPrivateKey)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Wrap a built config for the axum-server acceptor.
pub fn acceptor_config(config: Arc<ServerConfig>) -> RustlsConfig {
    RustlsConfig::from_config(config)
}
