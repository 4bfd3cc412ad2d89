//! Modelfetch is a crate aiming at downloading large model files over
//! HTTP(S): resumably, verified by checksum and installed atomically.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modelfetch::{DownloaderBuilder, MemoryRegistry, ModelInfo, Error};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let registry = Arc::new(MemoryRegistry::new("models"));
//! registry.insert(
//!     ModelInfo::new("ggml-gpt4all-j-v1.3-groovy.bin")
//!         .with_digest("81a09a0ddf89690372fc296ff7f625af"),
//! );
//!
//! let downloader = DownloaderBuilder::new(registry).build()?;
//! downloader.start_download("ggml-gpt4all-j-v1.3-groovy.bin").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! The modelfetch crate is organized into several modules:
//!
//! - [`download`] - Resume offsets, the temp file and the transfer session table
//! - [`downloader`] - The main `Downloader` and `DownloaderBuilder` driving transfers
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`http`] - HTTP client functionality and the `Transport` seam
//! - [`install`] - MD5 verification, install and the hash-and-install worker
//! - [`progress`] - Progress throttling, speed rendering and progress bars
//! - [`registry`] - The model registry seam and its in-memory implementation
//! - [`telemetry`] - Download lifecycle events
//! - [`utils`] - Shared utility functions

pub mod download;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod progress;
pub mod registry;
pub mod telemetry;
pub mod utils;

pub use download::{SessionId, SessionState};
pub use downloader::{Downloader, DownloaderBuilder, DownloaderConfig};
pub use error::{Error, Result};
pub use http::{create_http_client, HttpClientConfig, HttpTransport, Transport};
pub use progress::ProgressBarOpts;
pub use registry::{MemoryRegistry, ModelField, ModelInfo, Registry};
pub use telemetry::{Telemetry, TelemetryEvent};
pub use utils::content_length::parse_content_range_total;
