//! The model registry the download engine reads from and reports into.
//!
//! The registry is an external collaborator: a keyed store of per-model
//! metadata (URL, expected digest, install directory) and of the transfer
//! fields the coordinator keeps up to date (bytes, speed, flags, error text).
//! [`MemoryRegistry`] is the in-process implementation shipped with the
//! crate.

pub mod memory;

pub use memory::MemoryRegistry;

use std::path::{Path, PathBuf};

/// Prefix that marks a partially downloaded file in the install directory.
pub const INCOMPLETE_PREFIX: &str = "incomplete-";

/// Snapshot of everything the registry knows about one model file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    /// File name, unique key in the registry.
    pub filename: String,
    /// Human readable name.
    pub name: String,
    /// Directory the installed file lives in.
    pub dirpath: PathBuf,
    /// Download URL, empty to use the downloader's fallback base URL.
    pub url: String,
    /// Expected hex MD5 of the complete file, empty when unknown.
    pub expected_digest: String,
    /// Size of the installed file, when there is one.
    pub filesize: Option<u64>,
    /// Bytes on disk at the last progress update.
    pub bytes_received: u64,
    /// Full size of the file being downloaded.
    pub bytes_total: u64,
    /// Milliseconds since the epoch of the last progress update.
    pub timestamp: i64,
    /// Rendered transfer speed, e.g. `"1.50 MB/s"`.
    pub speed: String,
    pub is_downloading: bool,
    pub is_verifying: bool,
    /// Last failure text, empty when the last attempt succeeded.
    pub download_error: String,
    /// Derived from the filesystem: `<dirpath>/<filename>` exists.
    pub installed: bool,
    /// Derived from the filesystem: the incomplete-download file exists.
    pub is_incomplete: bool,
}

impl ModelInfo {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Builder-style URL setter.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Builder-style expected digest setter.
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = digest.into();
        self
    }

    /// Path of the installed artifact.
    pub fn install_path(&self) -> PathBuf {
        self.dirpath.join(&self.filename)
    }

    fn apply(&mut self, field: ModelField) {
        match field {
            ModelField::Name(v) => self.name = v,
            ModelField::Dirpath(v) => self.dirpath = v,
            ModelField::Url(v) => self.url = v,
            ModelField::ExpectedDigest(v) => self.expected_digest = v,
            ModelField::Filesize(v) => self.filesize = v,
            ModelField::BytesReceived(v) => self.bytes_received = v,
            ModelField::BytesTotal(v) => self.bytes_total = v,
            ModelField::Timestamp(v) => self.timestamp = v,
            ModelField::Speed(v) => self.speed = v,
            ModelField::Downloading(v) => self.is_downloading = v,
            ModelField::Verifying(v) => self.is_verifying = v,
            ModelField::DownloadError(v) => self.download_error = v,
        }
    }
}

/// One writable field of a [`ModelInfo`], with its new value.
///
/// `installed` and `is_incomplete` are not writable: the registry derives
/// them from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelField {
    Name(String),
    Dirpath(PathBuf),
    Url(String),
    ExpectedDigest(String),
    Filesize(Option<u64>),
    BytesReceived(u64),
    BytesTotal(u64),
    Timestamp(i64),
    Speed(String),
    Downloading(bool),
    Verifying(bool),
    DownloadError(String),
}

/// Port through which the download engine talks to the model registry.
///
/// Implementations must be safe to call from any thread and must apply each
/// call atomically with respect to other calls on the same filename.
pub trait Registry: Send + Sync {
    /// Whether `filename` is known.
    fn contains(&self, filename: &str) -> bool;

    /// Snapshot of the record for `filename`.
    fn model_info(&self, filename: &str) -> Option<ModelInfo>;

    /// Set one field. Unknown filenames are ignored.
    fn update_data(&self, filename: &str, field: ModelField) {
        self.update_many(filename, vec![field]);
    }

    /// Set several fields of one record as a single atomic write.
    fn update_many(&self, filename: &str, fields: Vec<ModelField>);

    /// Directory new downloads are installed into.
    fn local_models_path(&self) -> PathBuf;

    /// Deterministic path of the incomplete-download file for `filename`.
    fn incomplete_download_path(&self, filename: &str) -> PathBuf {
        incomplete_path_in(&self.local_models_path(), filename)
    }
}

/// `<dir>/incomplete-<filename>`.
pub fn incomplete_path_in(dir: &Path, filename: &str) -> PathBuf {
    dir.join(format!("{INCOMPLETE_PREFIX}{filename}"))
}
