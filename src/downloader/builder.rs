//! Builder pattern implementation for creating Downloader instances.
//!
//! A [`Downloader`] needs a [`Registry`] to work against; the transport and
//! the telemetry sink default to [`HttpTransport`] and [`NoopTelemetry`].
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust
//! use modelfetch::downloader::DownloaderBuilder;
//! use modelfetch::registry::MemoryRegistry;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), modelfetch::Error> {
//! let registry = Arc::new(MemoryRegistry::new("./models"));
//! let downloader = DownloaderBuilder::new(registry)
//!     .fallback_base_url("https://mirror.example.com/models/")
//!     .retries(2)
//!     .build()?;
//! # downloader.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Hidden Progress Bars
//!
//! ```rust
//! use modelfetch::downloader::DownloaderBuilder;
//! use modelfetch::registry::MemoryRegistry;
//! use modelfetch::telemetry::TracingTelemetry;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), modelfetch::Error> {
//! let registry = Arc::new(MemoryRegistry::new("./models"));
//! let downloader = DownloaderBuilder::hidden(registry)
//!     .telemetry(Arc::new(TracingTelemetry))
//!     .build()?;
//! # downloader.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::{config::DownloaderConfig, downloader::Downloader};
use crate::error::{Error, Result};
use crate::http::{HttpTransport, Transport};
use crate::progress::ProgressBarOpts;
use crate::registry::Registry;
use crate::telemetry::{NoopTelemetry, Telemetry};

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::{Proxy, Url};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A builder used to create a [`Downloader`].
pub struct DownloaderBuilder {
    config: DownloaderConfig,
    registry: Arc<dyn Registry>,
    transport: Option<Arc<dyn Transport>>,
    telemetry: Arc<dyn Telemetry>,
}

impl DownloaderBuilder {
    /// Creates a builder with the default options.
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            config: DownloaderConfig::default(),
            registry,
            transport: None,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Convenience function to hide the progress bars.
    pub fn hidden(registry: Arc<dyn Registry>) -> Self {
        Self::new(registry).progress_opts(ProgressBarOpts::hidden())
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DownloaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the URL prefix used for models without their own URL.
    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.fallback_base_url = url.into();
        self
    }

    /// Set the minimum time between two registry progress writes.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// Set how many bytes are dropped from a stale temp file.
    pub fn stale_rewind(mut self, bytes: u64) -> Self {
        self.config.stale_rewind = bytes;
        self
    }

    /// Set the block size used to hash and copy files.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Override the process start time used by the stale temp file check.
    pub fn started_at(mut self, started_at: SystemTime) -> Self {
        self.config.started_at = started_at;
        self
    }

    /// Set the number of retries per request.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.http.retries = retries;
        self
    }

    /// Send every request through `proxy`.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.config.http.proxy = Some(proxy);
        self
    }

    /// Skip TLS peer verification.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.http.accept_invalid_certs = accept;
        self
    }

    /// Set the progress bar options.
    pub fn progress_opts(mut self, opts: ProgressBarOpts) -> Self {
        self.config.progress = opts;
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.http.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add the http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be
    /// merged into a single one.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.http.headers = Some(new);
        self
    }

    /// Add the http header.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.http.headers = Some(new);
        self
    }

    /// Use `transport` instead of the reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Report lifecycle events to `telemetry`.
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Create the [`Downloader`] with the specified options.
    ///
    /// Must be called from within a tokio runtime: it starts the task that
    /// collects verification results.
    pub fn build(mut self) -> Result<Downloader> {
        if !self.config.fallback_base_url.ends_with('/') {
            self.config.fallback_base_url.push('/');
        }
        Url::parse(&self.config.fallback_base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.config.fallback_base_url, e)))?;

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(self.config.http.clone())?),
        };

        Downloader::new(self.config, self.registry, transport, self.telemetry)
    }
}
