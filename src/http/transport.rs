//! The transport seam: one ranged GET, streamed.
//!
//! The coordinator only ever talks to a [`Transport`]. [`HttpTransport`] is
//! the reqwest implementation; anything that can answer a ranged request
//! with a status, a couple of headers and a byte stream will do.

use crate::download::range_header;
use crate::http::{create_http_client, HttpClientConfig};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A GET for everything from `offset` on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: Url,
    pub offset: u64,
}

/// One item of a response body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Data(Bytes),
    /// Non-fatal condition worth logging, e.g. an unverified TLS peer.
    Warning(String),
}

/// Failure below or at the HTTP layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status, when the failure has one.
    pub status: Option<StatusCode>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, `0` when the failure happened below HTTP.
    pub fn code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.status(), e.to_string())
    }
}

impl From<reqwest_middleware::Error> for TransportError {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::new(None, e.to_string()),
        }
    }
}

/// Response head plus the streamed body.
pub struct TransferResponse {
    pub status: StatusCode,
    /// Advertised Content-Length, the remaining bytes for a ranged reply.
    pub content_length: Option<u64>,
    /// Raw Content-Range header value.
    pub content_range: Option<String>,
    pub body: BoxStream<'static, Result<TransportEvent, TransportError>>,
}

impl fmt::Debug for TransferResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

/// Issues ranged GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, req: TransferRequest) -> Result<TransferResponse, TransportError>;
}

/// [`Transport`] over a reqwest client with middleware.
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    accept_invalid_certs: bool,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let accept_invalid_certs = config.accept_invalid_certs;
        Ok(Self {
            client: create_http_client(config)?,
            accept_invalid_certs,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, req: TransferRequest) -> Result<TransferResponse, TransportError> {
        debug!("Fetching {} from byte {}", req.url, req.offset);
        let res = self
            .client
            .get(req.url.clone())
            .header(RANGE, range_header(req.offset))
            .send()
            .await?;

        let status = res.status();
        let content_length = res.content_length();
        let content_range = res
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let warnings = if self.accept_invalid_certs && req.url.scheme() == "https" {
            vec![Ok(TransportEvent::Warning(format!(
                "TLS peer verification is disabled for {}",
                req.url
            )))]
        } else {
            Vec::new()
        };

        let body = res
            .bytes_stream()
            .map(|item| item.map(TransportEvent::Data).map_err(TransportError::from));

        Ok(TransferResponse {
            status,
            content_length,
            content_range,
            body: stream::iter(warnings).chain(body).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_code() {
        assert_eq!(TransportError::new(None, "connection reset").code(), 0);
        assert_eq!(
            TransportError::new(Some(StatusCode::SERVICE_UNAVAILABLE), "unavailable").code(),
            503
        );
    }

    #[test]
    fn test_http_transport_builds() {
        let transport = HttpTransport::new(HttpClientConfig::default()).unwrap();
        assert!(format!("{transport:?}").contains("accept_invalid_certs: false"));
    }
}
