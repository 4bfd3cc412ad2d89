//! Core downloader implementation with the transfer lifecycle.
//!
//! The [`Downloader`] owns the session table and drives every transfer from
//! the request to the install:
//!
//! 1. `start_download` opens the temp file at its resume point, registers a
//!    session and spawns the transfer task.
//! 2. The transfer task streams the body into the temp file, reporting
//!    throttled progress to the registry.
//! 3. On completion the closed temp file goes to the hash-and-install
//!    worker thread; its outcome is collected by a background task that
//!    finalizes the registry state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modelfetch::downloader::DownloaderBuilder;
//! use modelfetch::registry::{MemoryRegistry, ModelInfo};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), modelfetch::Error> {
//! let registry = Arc::new(MemoryRegistry::new("./models"));
//! registry.insert(
//!     ModelInfo::new("ggml-model.bin").with_digest("9e107d9d372bb6826bd81d3542a419d6"),
//! );
//!
//! let downloader = DownloaderBuilder::new(registry.clone()).build()?;
//! downloader.start_download("ggml-model.bin").await?;
//!
//! // Later on.
//! downloader.cancel_download("ggml-model.bin").await;
//! downloader.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::config::DownloaderConfig;
use crate::download::{SessionId, SessionState, SessionTable, TempFile};
use crate::error::{Error, Result};
use crate::http::{TransferRequest, Transport, TransportEvent};
use crate::install::{HashAndInstallWorker, VerifyOutcome, VerifyRequest};
use crate::progress::{now_millis, throttled_speed, LastSample, ProgressDisplay};
use crate::registry::{ModelField, ModelInfo, Registry};
use crate::telemetry::{Telemetry, TelemetryEvent};
use crate::utils::{total_size, ContentRange};

use futures::StreamExt;
use reqwest::{StatusCode, Url};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Represents the download controller.
///
/// Cheap to clone; clones share the same sessions and worker.
#[derive(Clone)]
pub struct Downloader {
    inner: Arc<Inner>,
}

struct Inner {
    config: DownloaderConfig,
    registry: Arc<dyn Registry>,
    transport: Arc<dyn Transport>,
    telemetry: Arc<dyn Telemetry>,
    sessions: SessionTable,
    display: ProgressDisplay,
    verifier: Mutex<Option<UnboundedSender<VerifyRequest>>>,
    worker: Mutex<Option<HashAndInstallWorker>>,
    outcomes: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.inner.config)
            .field("active", &self.inner.sessions.filenames())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Downloader {
    /// Creates a new Downloader and starts its hash-and-install worker.
    pub(crate) fn new(
        config: DownloaderConfig,
        registry: Arc<dyn Registry>,
        transport: Arc<dyn Transport>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("downloader needs a tokio runtime: {}", e)))?;

        let (worker, verifier, outcomes) = HashAndInstallWorker::spawn(config.block_size)?;
        let display = ProgressDisplay::new(config.progress.clone());

        let inner = Arc::new(Inner {
            config,
            registry,
            transport,
            telemetry,
            sessions: SessionTable::new(),
            display,
            verifier: Mutex::new(Some(verifier)),
            worker: Mutex::new(Some(worker)),
            outcomes: Mutex::new(None),
        });

        let task = runtime.spawn(collect_outcomes(Arc::downgrade(&inner), outcomes));
        *lock(&inner.outcomes) = Some(task);

        Ok(Self { inner })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &DownloaderConfig {
        &self.inner.config
    }

    /// Gets the registry this downloader reports into.
    pub fn registry(&self) -> Arc<dyn Registry> {
        self.inner.registry.clone()
    }

    /// Filenames with an in-flight transfer, sorted.
    pub fn active_downloads(&self) -> Vec<String> {
        self.inner.sessions.filenames()
    }

    /// Whether a transfer session exists for `filename`.
    pub fn is_active(&self, filename: &str) -> bool {
        self.inner.sessions.contains(filename)
    }

    /// Start (or resume) downloading `filename`.
    ///
    /// Returns once the request is under way; the outcome is reported
    /// through the registry and telemetry.
    pub async fn start_download(&self, filename: &str) -> Result<SessionId> {
        let inner = &self.inner;
        let id = inner.sessions.reserve(filename)?;

        let info = match inner.registry.model_info(filename) {
            Some(info) => info,
            None => {
                inner.sessions.remove(id);
                warn!("Could not find model {} in the registry", filename);
                return Err(Error::UnknownTarget(filename.to_string()));
            }
        };

        let url = match inner.model_url(&info) {
            Ok(url) => url,
            Err(e) => {
                inner.sessions.remove(id);
                inner.record_error(filename, &e);
                return Err(e);
            }
        };

        let temp_path = inner.registry.incomplete_download_path(filename);
        let temp = match TempFile::open(
            &temp_path,
            inner.config.started_at,
            inner.config.stale_rewind,
        )
        .await
        {
            Ok(temp) => temp,
            Err(source) => {
                inner.sessions.remove(id);
                let e = Error::TempFileOpen {
                    filename: filename.to_string(),
                    path: temp_path,
                    source,
                };
                inner.record_error(filename, &e);
                return Err(e);
            }
        };

        let offset = temp.position();
        let bar = inner.display.create_bar(filename, offset);
        if !inner.sessions.set_start(id, offset, bar.clone()) {
            // Cancelled while the temp file was being opened.
            inner.display.finish(&bar, "cancelled");
            return Ok(id);
        }

        debug!("Starting {} from byte {} ({})", filename, offset, url);
        // The transfer waits until it is registered, so every terminal event
        // follows `DownloadStarted`.
        let (go, registered) = oneshot::channel::<()>();
        let task = tokio::spawn({
            let inner = self.inner.clone();
            let filename = filename.to_string();
            async move {
                if registered.await.is_ok() {
                    run_transfer(inner, id, filename, url, temp).await;
                }
            }
        });
        let attached = inner.sessions.attach_task(id, task, || {
            inner.registry.update_data(filename, ModelField::Downloading(true));
            inner.telemetry.emit(TelemetryEvent::DownloadStarted {
                filename: filename.to_string(),
            });
        });
        if attached {
            let _ = go.send(());
        } else {
            // Cancelled before the task was stored; dropping `go` ends it.
            debug!("{} was cancelled before its transfer started", filename);
        }

        Ok(id)
    }

    /// Abort the transfer of `filename`.
    ///
    /// The temp file is kept and closed by the time this returns. Does
    /// nothing when no transfer is running, or when the file is already
    /// being verified.
    pub async fn cancel_download(&self, filename: &str) {
        let inner = &self.inner;
        let Some(session) = inner.sessions.remove_cancellable(filename) else {
            debug!("Nothing to cancel for {}", filename);
            return;
        };

        if let Some(task) = session.task {
            task.abort();
            // The task owns the temp file; wait until it let go of it.
            let _ = task.await;
        }

        inner.registry.update_data(filename, ModelField::Downloading(false));
        if let Some(bar) = &session.bar {
            inner.display.finish(bar, "cancelled");
        }
        debug!("Cancelled {}", filename);
        inner.telemetry.emit(TelemetryEvent::DownloadCancelled {
            filename: filename.to_string(),
        });
    }

    /// Cancel any transfer of `filename` and delete its temp and installed
    /// files, resetting its transfer fields.
    ///
    /// Emits [`TelemetryEvent::ModelRemoved`] when an installed file was
    /// deleted.
    ///
    /// Fails with [`Error::AlreadyActive`] while the file is being verified.
    pub async fn remove_model(&self, filename: &str) -> Result<()> {
        let inner = &self.inner;
        self.cancel_download(filename).await;
        if inner.sessions.contains(filename) {
            return Err(Error::AlreadyActive(filename.to_string()));
        }

        remove_if_exists(&inner.registry.incomplete_download_path(filename)).await?;
        let removed = match inner.registry.model_info(filename) {
            Some(info) => remove_if_exists(&inner.install_path(&info)).await?,
            None => false,
        };

        inner.registry.update_many(
            filename,
            vec![
                ModelField::BytesReceived(0),
                ModelField::BytesTotal(0),
                ModelField::Timestamp(0),
                ModelField::Speed(String::new()),
                ModelField::DownloadError(String::new()),
                ModelField::Filesize(None),
            ],
        );
        if removed {
            inner.telemetry.emit(TelemetryEvent::ModelRemoved {
                filename: filename.to_string(),
            });
        }
        debug!("Removed {}", filename);
        Ok(())
    }

    /// Cancel every running transfer, let pending verifications finish and
    /// stop the worker thread.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        for filename in inner.sessions.filenames() {
            self.cancel_download(&filename).await;
        }

        // Dropping the sender lets the worker drain its queue and exit.
        lock(&inner.verifier).take();

        let worker = lock(&inner.worker).take();
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| Error::Internal(e.to_string()))??;
        }

        let outcomes = lock(&inner.outcomes).take();
        if let Some(task) = outcomes {
            task.await.map_err(|e| Error::Internal(e.to_string()))?;
        }
        debug!("Downloader shut down");
        Ok(())
    }
}

impl Inner {
    /// The model's own URL, or the fallback base URL joined with its name.
    fn model_url(&self, info: &ModelInfo) -> Result<Url> {
        if !info.url.is_empty() {
            return Url::parse(&info.url).map_err(|e| Error::InvalidUrl(format!("{}: {}", info.url, e)));
        }
        Url::parse(&self.config.fallback_base_url)
            .and_then(|base| base.join(&info.filename))
            .map_err(|e| {
                Error::InvalidUrl(format!(
                    "{}{}: {}",
                    self.config.fallback_base_url, info.filename, e
                ))
            })
    }

    fn install_path(&self, info: &ModelInfo) -> PathBuf {
        if info.dirpath.as_os_str().is_empty() {
            self.registry.local_models_path().join(&info.filename)
        } else {
            info.install_path()
        }
    }

    fn record_error(&self, filename: &str, e: &Error) {
        warn!("{}", e);
        self.registry
            .update_data(filename, ModelField::DownloadError(e.to_string()));
    }

    /// Handle one chunk landing in the temp file.
    ///
    /// Returns `false` once the session is gone, telling the transfer to stop.
    fn on_progress(&self, id: SessionId, position: u64, total: Option<u64>) -> bool {
        let Some(session) = self.sessions.get(id) else {
            return false;
        };
        if let Some(bar) = &session.bar {
            self.display.update(bar, position, total);
        }

        let Some(info) = self.registry.model_info(&session.filename) else {
            return true;
        };
        let now = now_millis();
        let last = LastSample {
            timestamp_ms: info.timestamp,
            bytes: info.bytes_received,
        };
        let Some(update) = throttled_speed(last, now, position, self.config.progress_interval)
        else {
            return true;
        };

        let mut fields = vec![
            ModelField::BytesReceived(position),
            ModelField::Speed(update.text),
            ModelField::Timestamp(now),
        ];
        if let Some(total) = total {
            fields.push(ModelField::BytesTotal(total));
        }
        self.registry.update_many(&session.filename, fields);
        true
    }

    /// End a transfer that failed before reaching verification.
    ///
    /// The temp file is kept for a later resume.
    fn fail_transfer(&self, id: SessionId, filename: &str, e: Error) {
        let Some(session) = self.sessions.remove(id) else {
            // Cancelled concurrently; the cancel already cleaned up.
            return;
        };

        let message = e.to_string();
        warn!("{}", message);
        self.registry.update_many(
            filename,
            vec![
                ModelField::Downloading(false),
                ModelField::DownloadError(message.clone()),
            ],
        );
        if let Some(bar) = &session.bar {
            self.display.finish(bar, "failed");
        }
        self.telemetry.emit(TelemetryEvent::DownloadError {
            filename: filename.to_string(),
            code: e.code().unwrap_or(0),
            message,
        });
    }

    /// Close the temp file and hand it over for verification.
    async fn finish_transfer(&self, id: SessionId, filename: &str, temp: TempFile) {
        let closed = match temp.close().await {
            Ok(closed) => closed,
            Err(source) => return self.fail_transfer(id, filename, Error::IOError { source }),
        };

        let Some(info) = self.registry.model_info(filename) else {
            warn!("{} is no longer in the registry, not installing", filename);
            if let Some(session) = self.sessions.remove(id) {
                if let Some(bar) = &session.bar {
                    self.display.finish(bar, "dropped");
                }
                self.telemetry.emit(TelemetryEvent::DownloadFinished {
                    filename: filename.to_string(),
                    success: false,
                });
            }
            return;
        };

        if !self.sessions.set_state(id, SessionState::Verifying) {
            return;
        }
        self.registry.update_data(filename, ModelField::Verifying(true));
        if let Some(bar) = self.sessions.get(id).and_then(|s| s.bar) {
            self.display.set_verifying(&bar);
        }

        debug!("Handing {:?} over for verification", closed.path());
        let request = VerifyRequest {
            id,
            filename: filename.to_string(),
            expected_digest: info.expected_digest.clone(),
            save_path: self.registry.local_models_path().join(filename),
            temp_file: closed,
        };

        let rejected = match lock(&self.verifier).as_ref() {
            Some(tx) => tx.send(request).err().map(|e| e.0),
            None => Some(request),
        };
        if let Some(request) = rejected {
            self.finalize(VerifyOutcome {
                id,
                filename: request.filename,
                temp_file: request.temp_file,
                result: Err(Error::Internal("downloader is shut down".into())),
            });
        }
    }

    /// Apply a verification outcome to the registry and end the session.
    fn finalize(&self, outcome: VerifyOutcome) {
        let VerifyOutcome {
            id,
            filename,
            temp_file,
            result,
        } = outcome;
        let session = self.sessions.remove(id);

        let mut fields = vec![
            ModelField::Verifying(false),
            ModelField::Downloading(false),
        ];
        match &result {
            Ok(()) => {
                debug!("Installed {}", filename);
                fields.push(ModelField::DownloadError(String::new()));
                fields.push(ModelField::Dirpath(self.registry.local_models_path()));
            }
            Err(e) => {
                warn!("{} ({:?})", e, temp_file.path());
                fields.push(ModelField::DownloadError(e.to_string()));
            }
        }
        self.registry.update_many(&filename, fields);

        if let Some(bar) = session.and_then(|s| s.bar) {
            let label = if result.is_ok() { "installed" } else { "failed" };
            self.display.finish(&bar, label);
        }
        self.telemetry.emit(TelemetryEvent::DownloadFinished {
            filename,
            success: result.is_ok(),
        });
    }
}

/// Body of the transfer task for session `id`.
async fn run_transfer(inner: Arc<Inner>, id: SessionId, filename: String, url: Url, mut temp: TempFile) {
    let offset = temp.position();
    let network_error = |code: u16, message: String| Error::Network {
        filename: filename.clone(),
        code,
        message,
    };

    let res = match inner.transport.get(TransferRequest { url, offset }).await {
        Ok(res) => res,
        Err(e) => return inner.fail_transfer(id, &filename, network_error(e.code(), e.message)),
    };
    if !inner.sessions.set_state(id, SessionState::Downloading) {
        return;
    }

    // Check the status for errors.
    if res.status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
        let total = res
            .content_range
            .as_deref()
            .and_then(ContentRange::parse)
            .and_then(|r| r.total);
        if total == Some(offset) {
            debug!("{} was already fully downloaded", filename);
            return inner.finish_transfer(id, &filename, temp).await;
        }
    }
    if !res.status.is_success() {
        let reason = res.status.canonical_reason().unwrap_or("HTTP error").to_string();
        return inner.fail_transfer(id, &filename, network_error(res.status.as_u16(), reason));
    }
    if res.status == StatusCode::OK && offset > 0 {
        warn!("Server ignored the range request for {}, restarting from zero", filename);
        if let Err(source) = temp.restart().await {
            return inner.fail_transfer(id, &filename, Error::IOError { source });
        }
    }

    let total = total_size(res.content_length, res.content_range.as_deref(), temp.position());

    // Download the file chunk by chunk.
    debug!("Retrieving chunks of {}...", filename);
    let mut body = res.body;
    while let Some(event) = body.next().await {
        match event {
            Ok(TransportEvent::Data(chunk)) => {
                if let Err(source) = temp.write_chunk(&chunk).await {
                    return inner.fail_transfer(id, &filename, Error::IOError { source });
                }
                if !inner.on_progress(id, temp.position(), total) {
                    return;
                }
            }
            Ok(TransportEvent::Warning(warning)) => warn!("{}: {}", filename, warning),
            Err(e) => {
                return inner.fail_transfer(id, &filename, network_error(e.code(), e.message));
            }
        }
    }

    inner.finish_transfer(id, &filename, temp).await;
}

/// Forward worker outcomes to the downloader until the worker exits.
async fn collect_outcomes(inner: Weak<Inner>, mut outcomes: UnboundedReceiver<VerifyOutcome>) {
    while let Some(outcome) = outcomes.recv().await {
        match inner.upgrade() {
            Some(inner) => inner.finalize(outcome),
            None => break,
        }
    }
}

/// Delete `path`, reporting whether there was anything to delete.
async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Deleted {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::IOError { source }),
    }
}
