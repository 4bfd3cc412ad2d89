//! Downloader module containing the coordinator, its builder and configuration.
//!
//! The [`Downloader`] drives every transfer through its lifecycle:
//!
//! ```text
//! Idle → Requesting → Downloading → Verifying → Installed
//!                          │             └──────→ Failed
//!                          └──────────────────→ Failed
//! any active state ─── cancel ───→ Cancelled
//! ```
//!
//! `Failed` and `Cancelled` return to `Idle`: starting the download again
//! resumes from the temp file.
//!
//! # Overview
//!
//! - `downloader` - the coordinator and its transfer task
//! - `builder` - DownloaderBuilder for flexible configuration
//! - `config` - configuration structure and defaults
//!
//! # Examples
//!
//! ```rust,no_run
//! use modelfetch::downloader::DownloaderBuilder;
//! use modelfetch::registry::{MemoryRegistry, ModelInfo, Registry};
//! use modelfetch::telemetry::{ChannelTelemetry, TelemetryEvent};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MemoryRegistry::new("./models"));
//! registry.insert(ModelInfo::new("ggml-model.bin").with_url("https://example.com/ggml-model.bin"));
//!
//! let (telemetry, mut events) = ChannelTelemetry::new();
//! let downloader = DownloaderBuilder::hidden(registry.clone())
//!     .telemetry(Arc::new(telemetry))
//!     .build()?;
//!
//! downloader.start_download("ggml-model.bin").await?;
//! while let Some(event) = events.recv().await {
//!     if let TelemetryEvent::DownloadFinished { success, .. } = event {
//!         println!("installed: {}", success);
//!         break;
//!     }
//! }
//! assert!(!registry.model_info("ggml-model.bin").unwrap().is_downloading);
//! downloader.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod downloader;

pub use builder::DownloaderBuilder;
pub use config::{DownloaderConfig, DEFAULT_FALLBACK_BASE_URL, DEFAULT_PROGRESS_INTERVAL};
pub use downloader::Downloader;
