// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the composer's worker API.
//!
//! One HTTP request corresponds to exactly one queue operation, so the
//! client opens a fresh connection per request: either a unix socket
//! (trusted local composer) or a TLS TCP connection with a client
//! certificate (remote composer).

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use kiln_core::QueueStatus;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid TLS material: {0}")]
    Tls(String),

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl ClientError {
    /// 4xx responses are fatal for the current job; everything else is
    /// worth a retry after backoff.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Rejected { status, .. } if (400..500).contains(status))
    }
}

type RequestBody = BoxBody<Bytes, std::io::Error>;

enum Transport {
    Unix(PathBuf),
    Tls { host: String, port: u16, connector: TlsConnector, server_name: ServerName<'static> },
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Unix(path) => f.debug_tuple("Unix").field(path).finish(),
            Transport::Tls { host, port, server_name, .. } => f
                .debug_struct("Tls")
                .field("host", host)
                .field("port", port)
                .field("server_name", server_name)
                .finish_non_exhaustive(),
        }
    }
}

pub struct Client {
    transport: Transport,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("transport", &self.transport).finish()
    }
}

impl Client {
    /// Client over a trusted unix socket.
    pub fn new_unix(path: impl Into<PathBuf>) -> Self {
        Self { transport: Transport::Unix(path.into()) }
    }

    /// Client over TLS with mutual authentication.
    pub fn new_tls(
        address: &str,
        ca_path: &Path,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<Self, ClientError> {
        use tokio_rustls::rustls::{ClientConfig, RootCertStore};

        let (host, port) = address
            .rsplit_once(':')
            .and_then(|(host, port)| port.parse::<u16>().ok().map(|p| (host.to_string(), p)))
            .ok_or_else(|| ClientError::Transport(format!("invalid address: {address}")))?;

        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut BufReader::new(std::fs::File::open(ca_path)?)) {
            roots.add(cert?).map_err(|e| ClientError::Tls(e.to_string()))?;
        }
        let certs = rustls_pemfile::certs(&mut BufReader::new(std::fs::File::open(cert_path)?))
            .collect::<Result<Vec<_>, _>>()?;
        let key = rustls_pemfile::private_key(&mut BufReader::new(std::fs::File::open(key_path)?))?
            .ok_or_else(|| ClientError::Tls("no private key found".to_string()))?;

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ClientError::Tls(e.to_string()))?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| ClientError::Tls(e.to_string()))?;

        Ok(Self {
            transport: Transport::Tls {
                host,
                port,
                connector: TlsConnector::from(Arc::new(config)),
                server_name,
            },
        })
    }

    /// Claim the next job of any of the given types. Blocks server-side
    /// until one is ready. Returns the raw envelope; the `type` field
    /// names which kind was handed out.
    pub async fn request_job(&self, job_types: &[&str]) -> Result<Value, ClientError> {
        let body = json_body(&json!({ "job_types": job_types }))?;
        let (status, bytes) =
            self.request(Method::POST, "/job-queue/v1/jobs", Some("application/json"), body)
                .await?;
        if status != StatusCode::CREATED {
            return Err(rejected(status, &bytes));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Poll the cancellation flag.
    pub async fn job_canceled(&self, id: Uuid) -> Result<bool, ClientError> {
        let (status, bytes) = self
            .request(Method::GET, &format!("/job-queue/v1/jobs/{id}"), None, empty_body())
            .await?;
        if status != StatusCode::OK {
            return Err(rejected(status, &bytes));
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(value["canceled"].as_bool().unwrap_or(false))
    }

    /// Report a terminal status and result.
    pub async fn update_job(
        &self,
        id: Uuid,
        status: QueueStatus,
        result: &Value,
    ) -> Result<(), ClientError> {
        let body = json_body(&json!({ "status": status, "result": result }))?;
        let (code, bytes) = self
            .request(
                Method::PATCH,
                &format!("/job-queue/v1/jobs/{id}"),
                Some("application/json"),
                body,
            )
            .await?;
        if code != StatusCode::OK {
            return Err(rejected(code, &bytes));
        }
        Ok(())
    }

    /// Stream an artifact to the composer.
    pub async fn upload_artifact(
        &self,
        id: Uuid,
        name: &str,
        file: tokio::fs::File,
    ) -> Result<(), ClientError> {
        use futures_util::TryStreamExt;

        let stream = tokio_util::io::ReaderStream::new(file).map_ok(Frame::data);
        let body = BoxBody::new(StreamBody::new(stream));
        let (status, bytes) = self
            .request(
                Method::POST,
                &format!("/job-queue/v1/jobs/{id}/artifacts/{name}"),
                Some("application/octet-stream"),
                body,
            )
            .await?;
        if status != StatusCode::OK {
            return Err(rejected(status, &bytes));
        }
        Ok(())
    }

    /// One request over a fresh connection.
    async fn request(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: RequestBody,
    ) -> Result<(StatusCode, Bytes), ClientError> {
        let mut builder = Request::builder().method(method).uri(path).header("host", "kilnd");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let request =
            builder.body(body).map_err(|e| ClientError::Transport(e.to_string()))?;

        match &self.transport {
            Transport::Unix(path) => {
                let stream = UnixStream::connect(path).await?;
                self.send(stream, request).await
            }
            Transport::Tls { host, port, connector, server_name } => {
                let tcp = TcpStream::connect((host.as_str(), *port)).await?;
                let stream = connector
                    .connect(server_name.clone(), tcp)
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                self.send(stream, request).await
            }
        }
    }

    async fn send<S>(
        &self,
        stream: S,
        request: Request<RequestBody>,
    ) -> Result<(StatusCode, Bytes), ClientError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .to_bytes();
        Ok((status, bytes))
    }
}

fn empty_body() -> RequestBody {
    BoxBody::new(Full::new(Bytes::new()).map_err(|never| match never {}))
}

fn json_body<T: Serialize>(value: &T) -> Result<RequestBody, ClientError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(BoxBody::new(Full::new(Bytes::from(bytes)).map_err(|never| match never {})))
}

fn rejected(status: StatusCode, bytes: &Bytes) -> ClientError {
    let message = serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).to_string());
    ClientError::Rejected { status: status.as_u16(), message }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
