//! Single-attempt HTTP exchange used by the REST client.
//!
//! The transport performs exactly one request. Retrying, status mapping and
//! JSON handling live in the client; the transport only reports whether the
//! exchange reached the server.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use switchyard_core::ApplicationError;

use super::config::ClientOptions;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Failure of one exchange before a complete response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("response body could not be read: {0}")]
    Body(String),

    #[error("request could not be built: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Request(_))
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the connect and overall timeouts from `options`.
    ///
    /// # Errors
    ///
    /// Returns `CLIENT_INIT_FAILED` if the TLS backend cannot be initialized.
    pub fn new(options: &ClientOptions) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout())
            .timeout(options.timeout())
            .build()
            .map_err(|e| {
                ApplicationError::configuration(None, "CLIENT_INIT_FAILED", "Failed to create HTTP client")
                    .with_cause(e)
            })?;
        Ok(Self { client })
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    let text = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout(text)
    } else if err.is_builder() {
        TransportError::Request(text)
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(text)
    } else {
        TransportError::Connect(text)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify(&e))?;
        Ok(TransportResponse { status, body })
    }
}
