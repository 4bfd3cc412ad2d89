//! HTTP client setup and middleware configuration.
//!
//! This module creates the reqwest client the [`HttpTransport`] sends its
//! requests with, layered with tracing and an optional retry policy.
//!
//! # Features
//!
//! - **Tracing**: every request is traced through `reqwest-tracing`
//! - **Retry Logic**: exponential backoff for transient failures, off by
//!   default since an interrupted transfer resumes on the next start
//! - **Proxy Support**: optional HTTP/HTTPS proxy configuration
//! - **Custom Headers**: default headers applied to all requests
//! - **TLS**: peer verification can be turned off for self-hosted mirrors
//!
//! # Examples
//!
//! ## Basic Client Creation
//!
//! ```rust
//! use modelfetch::http::{create_http_client, HttpClientConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::default();
//! let client = create_http_client(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Client with Custom Configuration
//!
//! ```rust
//! use modelfetch::http::{create_http_client, HttpClientConfig};
//! use reqwest::header::{HeaderMap, USER_AGENT};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut headers = HeaderMap::new();
//! headers.insert(USER_AGENT, "modelfetch/0.1".parse()?);
//!
//! let config = HttpClientConfig {
//!     retries: 2,
//!     headers: Some(headers),
//!     ..HttpClientConfig::default()
//! };
//!
//! let client = create_http_client(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`HttpTransport`]: crate::http::HttpTransport

use reqwest::{header::HeaderMap, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;

/// Configuration for HTTP client setup.
#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// Number of retries for failed requests.
    pub retries: u32,
    /// Optional proxy configuration.
    pub proxy: Option<Proxy>,
    /// Default headers to include with all requests.
    pub headers: Option<HeaderMap>,
    /// Skip TLS peer verification. Each https request then carries a
    /// warning the coordinator logs.
    pub accept_invalid_certs: bool,
}

/// Creates an HTTP client with middleware configuration.
///
/// This function sets up a reqwest client with:
/// - Tracing middleware for request/response logging
/// - Retry middleware with exponential backoff
/// - Optional proxy support
/// - Optional default headers
///
/// # Example
///
/// ```rust
/// use modelfetch::http::client::{create_http_client, HttpClientConfig};
///
/// let config = HttpClientConfig::default();
/// let client = create_http_client(config).unwrap();
/// ```
pub fn create_http_client(
    config: HttpClientConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    // Set up retry policy with exponential backoff
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.retries);

    // Build the inner reqwest client
    let mut inner_client_builder = reqwest::Client::builder();

    // Configure proxy if provided
    if let Some(proxy) = config.proxy {
        inner_client_builder = inner_client_builder.proxy(proxy);
    }

    // Configure default headers if provided
    if let Some(headers) = config.headers {
        inner_client_builder = inner_client_builder.default_headers(headers);
    }

    if config.accept_invalid_certs {
        inner_client_builder = inner_client_builder.danger_accept_invalid_certs(true);
    }

    // Build the inner client
    let inner_client = inner_client_builder.build()?;

    // Build the client with middleware
    let client = ClientBuilder::new(inner_client)
        // Trace HTTP requests. See the tracing crate to make use of these traces.
        .with(TracingMiddleware::default())
        // Retry failed requests.
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    Ok(client)
}
