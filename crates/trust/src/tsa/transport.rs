//! HTTP transport for TSA requests.
//!
//! The adapters talk to the network only through [`TsaTransport`], so tests
//! can substitute a mock and production uses [`HyperTransport`] (hyper 1.x
//! client over rustls with the webpki root store).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// MIME type of a DER `TimeStampReq`.
pub const TIMESTAMP_QUERY: &str = "application/timestamp-query";

/// MIME type of a DER `TimeStampResp`.
pub const TIMESTAMP_REPLY: &str = "application/timestamp-reply";

/// Largest TSA response body read into memory.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// One outgoing TSA POST.
#[derive(Clone)]
pub struct TsaHttpRequest {
    pub url: String,
    /// DER-encoded `TimeStampReq`.
    pub body: Vec<u8>,
    /// Full `Authorization` header value, if the provider authenticates.
    pub authorization: Option<String>,
    /// Deadline for the whole exchange, body included.
    pub timeout: Duration,
}

impl fmt::Debug for TsaHttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsaHttpRequest")
            .field("url", &self.url)
            .field("body_len", &self.body.len())
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Status and body of a TSA answer.
#[derive(Debug, Clone)]
pub struct TsaHttpResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Errors produced below the HTTP status layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The deadline elapsed before the exchange completed.
    #[error("request timed out")]
    Timeout,

    /// The URL or headers could not form a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, TLS, or body read failure.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Sends a DER request to a TSA endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TsaTransport: Send + Sync {
    async fn post(&self, request: TsaHttpRequest) -> Result<TsaHttpResponse, TransportError>;
}

/// Production transport: pooled hyper client with rustls (ring provider).
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    /// Build the HTTPS client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the TLS configuration
    /// cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| TransportError::InvalidRequest(format!("TLS setup failed: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client })
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HyperTransport")
    }
}

#[async_trait]
impl TsaTransport for HyperTransport {
    async fn post(&self, request: TsaHttpRequest) -> Result<TsaHttpResponse, TransportError> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(request.url.as_str())
            .header(CONTENT_TYPE, TIMESTAMP_QUERY)
            .header(ACCEPT, TIMESTAMP_REPLY);
        if let Some(auth) = request.authorization.as_deref() {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let http_request = builder
            .body(Full::new(Bytes::from(request.body)))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(http_request)
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
            let status = response.status().as_u16();
            let body = Limited::new(response.into_body(), MAX_RESPONSE_BYTES)
                .collect()
                .await
                .map_err(|e| {
                    if e.is::<LengthLimitError>() {
                        TransportError::Connection(format!(
                            "response body exceeds {MAX_RESPONSE_BYTES} bytes"
                        ))
                    } else {
                        TransportError::Connection(e.to_string())
                    }
                })?
                .to_bytes();
            Ok::<_, TransportError>(TsaHttpResponse { status, body })
        };

        tokio::time::timeout(request.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
