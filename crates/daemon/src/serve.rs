// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listeners: a trusted unix socket and an optional mTLS TCP socket for
//! remote workers.

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("cannot read TLS material: {0}")]
    Io(#[from] std::io::Error),

    #[error("no private key found in key file")]
    NoPrivateKey,

    #[error("invalid client CA certificate")]
    InvalidClientCa,

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
}

/// Build a server TLS config that requires a client certificate signed by
/// the given CA. Remote workers authenticate with nothing else.
pub fn load_server_tls(
    ca_path: &Path,
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<tokio_rustls::rustls::ServerConfig>, TlsError> {
    use tokio_rustls::rustls::{server::WebPkiClientVerifier, RootCertStore, ServerConfig};

    let certs = rustls_pemfile::certs(&mut BufReader::new(std::fs::File::open(cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(std::fs::File::open(key_path)?))?
        .ok_or(TlsError::NoPrivateKey)?;

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(std::fs::File::open(ca_path)?)) {
        roots.add(cert?).map_err(|_| TlsError::InvalidClientCa)?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|_| TlsError::InvalidClientCa)?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Accept loop for the remote worker listener.
///
/// Each connection is TLS-handshaked and then served by the same router as
/// the unix socket; a failed handshake only drops that connection.
pub async fn serve_mtls(
    listener: TcpListener,
    config: Arc<tokio_rustls::rustls::ServerConfig>,
    app: Router,
) -> std::io::Result<()> {
    let acceptor = TlsAcceptor::from(config);
    info!(addr = %listener.local_addr()?, "remote worker listener ready");

    loop {
        let (stream, addr) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let app = app.clone();

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%addr, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = TowerToHyperService::new(app);
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                debug!(%addr, error = %e, "connection error");
            }
        });
    }
}
