//! Outbound HTTP transport.
//!
//! The proxy core treats the transport as a black box satisfying at most one
//! success/error outcome per call. The production implementation is a pooled
//! hyper client with rustls; tests substitute their own [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::debug;

use crate::registry::Method;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    /// Serialized params for POST; GET carries them in the URL.
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request url [{url}]: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to [{url}] failed: {reason}")]
    Failed { url: String, reason: String },
    #[error("request to [{url}] timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("failed to read response body from [{url}]: {reason}")]
    Body { url: String, reason: String },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

type PooledClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Pooled hyper client over rustls with native roots.
pub struct HyperTransport {
    client: PooledClient,
}

impl HyperTransport {
    pub fn new() -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(60)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(10)));
        http_connector.enforce_http(false); // Allow both HTTP and HTTPS

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("Failed to load native root certificates")
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32)
            .build(https_connector);

        HyperTransport { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let uri: hyper::Uri = request.url.parse().map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: format!("{e}"),
        })?;

        debug!("dispatching {} {}", request.method.as_str(), request.url);

        let mut builder = hyper::Request::builder()
            .method(request.method.as_str())
            .uri(uri);
        if request.method == Method::Post {
            builder = builder.header("content-type", "application/x-www-form-urlencoded");
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let body = Bytes::from(request.body.clone().unwrap_or_default());
        let outbound = builder
            .body(Full::new(body))
            .map_err(|e| TransportError::InvalidUrl {
                url: request.url.clone(),
                reason: format!("{e}"),
            })?;

        let timeout_ms = request.timeout.as_millis() as u64;
        let response = tokio::time::timeout(request.timeout, self.client.request(outbound))
            .await
            .map_err(|_| TransportError::Timeout {
                url: request.url.clone(),
                timeout_ms,
            })?
            .map_err(|e| TransportError::Failed {
                url: request.url.clone(),
                reason: format!("{e}"),
            })?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Body {
                url: request.url.clone(),
                reason: format!("{e}"),
            })?
            .to_bytes();

        Ok(TransportResponse { status, body })
    }
}
