//! Tests for HTTP module functionality.

use modelfetch::http::client::{create_http_client, HttpClientConfig};
use modelfetch::http::{HttpTransport, TransferRequest, Transport, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};

#[test]
fn test_default_config() {
    let config = HttpClientConfig::default();
    assert_eq!(config.retries, 0);
    assert!(config.proxy.is_none());
    assert!(config.headers.is_none());
    assert!(!config.accept_invalid_certs);
}

#[test]
fn test_create_http_client_default() {
    let config = HttpClientConfig::default();
    let client = create_http_client(config);
    assert!(client.is_ok());
}

#[test]
fn test_http_config_with_custom_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("modelfetch-test"));
    let config = HttpClientConfig {
        retries: 2,
        headers: Some(headers),
        accept_invalid_certs: true,
        ..Default::default()
    };

    assert_eq!(
        config.headers.as_ref().unwrap().get(USER_AGENT),
        Some(&HeaderValue::from_static("modelfetch-test"))
    );
    assert!(create_http_client(config).is_ok());
}

#[test]
fn test_transport_error_code() {
    let e = TransportError::new(Some(StatusCode::NOT_FOUND), "Not Found");
    assert_eq!(e.code(), 404);
    assert!(e.to_string().contains("Not Found"));

    let e = TransportError::new(None, "connection refused");
    assert_eq!(e.code(), 0);
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error() {
    let transport = HttpTransport::new(HttpClientConfig::default()).unwrap();
    // Port 9 on localhost: nothing listens there.
    let req = TransferRequest {
        url: Url::parse("http://127.0.0.1:9/model.bin").unwrap(),
        offset: 0,
    };
    let err = transport.get(req).await.unwrap_err();
    assert_eq!(err.code(), 0);
    assert!(!err.message.is_empty());
}
