//! HTTP module containing the transport side of a download.
//!
//! # Overview
//!
//! - [`client`] - HTTP client creation and middleware configuration
//! - [`transport`] - the [`Transport`] seam and its reqwest implementation
//!
//! # Examples
//!
//! ## Issuing a Ranged Request
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use modelfetch::http::{HttpClientConfig, HttpTransport, TransferRequest, Transport, TransportEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpClientConfig::default())?;
//! let mut res = transport
//!     .get(TransferRequest {
//!         url: "https://gpt4all.io/models/ggml-model.bin".parse()?,
//!         offset: 1024,
//!     })
//!     .await?;
//!
//! while let Some(event) = res.body.next().await {
//!     if let TransportEvent::Data(chunk) = event? {
//!         println!("{} bytes", chunk.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod transport;

pub use client::{create_http_client, HttpClientConfig};
pub use transport::{
    HttpTransport, TransferRequest, TransferResponse, Transport, TransportError, TransportEvent,
};
