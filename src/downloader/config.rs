//! Configuration structures and defaults for the downloader.
//!
//! # Examples
//!
//! ```rust
//! use modelfetch::downloader::DownloaderConfig;
//! use std::time::Duration;
//!
//! let config = DownloaderConfig::default();
//! assert_eq!(config.progress_interval, Duration::from_millis(1000));
//! assert_eq!(config.stale_rewind, 1024 * 1024);
//! assert_eq!(config.block_size, 16 * 1024);
//! ```

use crate::download::{process_start, STALE_REWIND};
use crate::http::HttpClientConfig;
use crate::install::BLOCK_SIZE;
use crate::progress::ProgressBarOpts;

use std::time::{Duration, SystemTime};

/// Base URL a model without its own URL is fetched from.
pub const DEFAULT_FALLBACK_BASE_URL: &str = "https://gpt4all.io/models/";

/// Minimum time between two registry progress writes for one file.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration structure for the downloader.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// URL prefix for models whose registry entry has no URL. Ends with `/`.
    pub fallback_base_url: String,
    /// Throttle interval of registry progress updates.
    pub progress_interval: Duration,
    /// Bytes dropped from a temp file that predates `started_at`.
    pub stale_rewind: u64,
    /// Block size used to hash and copy files.
    pub block_size: usize,
    /// When this process started, for the stale temp file check. Defaults to
    /// [`process_start`], shared by every config in the process.
    pub started_at: SystemTime,
    /// HTTP client settings for the default transport.
    pub http: HttpClientConfig,
    /// Terminal progress bar options.
    pub progress: ProgressBarOpts,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            fallback_base_url: DEFAULT_FALLBACK_BASE_URL.into(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            stale_rewind: STALE_REWIND,
            block_size: BLOCK_SIZE,
            started_at: process_start(),
            http: HttpClientConfig::default(),
            progress: ProgressBarOpts::default(),
        }
    }
}
