#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use modelfetch::http::{TransferRequest, TransferResponse, Transport, TransportError, TransportEvent};
use modelfetch::install::{md5_hex, BLOCK_SIZE};
use modelfetch::registry::{MemoryRegistry, ModelInfo};
use modelfetch::telemetry::{ChannelTelemetry, TelemetryEvent};
use modelfetch::{Downloader, DownloaderBuilder};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

// Common test constants
pub const TEST_BASE_URL: &str = "http://models.test/";
pub const CHUNK_SIZE: usize = 64 * 1024;
pub const MIB: usize = 1024 * 1024;

/// How the fake server answers requests for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Honour ranges, 206 with Content-Range for non-zero offsets.
    Normal,
    /// Like `Normal`, but the stream errors once the absolute position
    /// reaches the given byte.
    FailAt(u64),
    /// Always answer 200 with the full body.
    IgnoreRange,
    /// Serve up to the given absolute byte, then never finish.
    StallAt(u64),
    /// Answer with this status and an empty body.
    Status(u16),
}

#[derive(Debug, Clone)]
struct Served {
    content: Arc<Vec<u8>>,
    behavior: Behavior,
    warning: Option<String>,
}

/// In-memory [`Transport`] serving fixed content per URL.
#[derive(Debug, Default)]
pub struct FakeTransport {
    served: Mutex<HashMap<String, Served>>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, content: Vec<u8>, behavior: Behavior) {
        self.served.lock().unwrap().insert(
            url.to_string(),
            Served {
                content: Arc::new(content),
                behavior,
                warning: None,
            },
        );
    }

    pub fn set_behavior(&self, url: &str, behavior: Behavior) {
        self.served.lock().unwrap().get_mut(url).unwrap().behavior = behavior;
    }

    pub fn set_warning(&self, url: &str, warning: &str) {
        self.served.lock().unwrap().get_mut(url).unwrap().warning = Some(warning.to_string());
    }

    /// `(url, offset)` of every request, in order.
    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.requests().into_iter().map(|(_, offset)| offset).collect()
    }
}

fn chunks(content: &[u8], from: usize, to: usize) -> Vec<Result<TransportEvent, TransportError>> {
    content[from..to]
        .chunks(CHUNK_SIZE)
        .map(|c| Ok(TransportEvent::Data(Bytes::copy_from_slice(c))))
        .collect()
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, req: TransferRequest) -> Result<TransferResponse, TransportError> {
        let url = req.url.to_string();
        self.requests.lock().unwrap().push((url.clone(), req.offset));

        let served = self
            .served
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| TransportError::new(None, format!("host not found: {url}")))?;
        let len = served.content.len();
        let offset = req.offset as usize;

        let warnings: Vec<Result<TransportEvent, TransportError>> = served
            .warning
            .iter()
            .map(|w| Ok(TransportEvent::Warning(w.clone())))
            .collect();

        if let Behavior::Status(code) = served.behavior {
            return Ok(TransferResponse {
                status: StatusCode::from_u16(code).unwrap(),
                content_length: Some(0),
                content_range: None,
                body: stream::empty().boxed(),
            });
        }

        let ranged = served.behavior != Behavior::IgnoreRange && offset > 0;
        if ranged && offset >= len {
            return Ok(TransferResponse {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                content_length: Some(0),
                content_range: Some(format!("bytes */{len}")),
                body: stream::empty().boxed(),
            });
        }
        let start = if ranged { offset } else { 0 };

        let (end, tail) = match served.behavior {
            Behavior::FailAt(at) => (at as usize, Some(false)),
            Behavior::StallAt(at) => (at as usize, Some(true)),
            _ => (len, None),
        };
        let end = end.clamp(start, len);
        let body = stream::iter(warnings).chain(stream::iter(chunks(&served.content, start, end)));
        let body = match tail {
            Some(false) => body
                .chain(stream::once(async {
                    Err(TransportError::new(None, "connection reset by peer"))
                }))
                .boxed(),
            Some(true) => body.chain(stream::pending()).boxed(),
            None => body.boxed(),
        };

        if ranged {
            Ok(TransferResponse {
                status: StatusCode::PARTIAL_CONTENT,
                content_length: Some((len - offset) as u64),
                content_range: Some(format!("bytes {}-{}/{}", offset, len - 1, len)),
                body,
            })
        } else {
            Ok(TransferResponse {
                status: StatusCode::OK,
                content_length: Some(len as u64),
                content_range: None,
                body,
            })
        }
    }
}

/// Everything a downloader test needs.
pub struct Harness {
    pub dir: TempDir,
    pub registry: Arc<MemoryRegistry>,
    pub transport: Arc<FakeTransport>,
    pub downloader: Downloader,
    pub events: UnboundedReceiver<TelemetryEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(|b| b)
    }

    /// Build with extra builder options. Must run inside a tokio runtime.
    pub fn with_builder(f: impl FnOnce(DownloaderBuilder) -> DownloaderBuilder) -> Self {
        init_tracing();
        let dir = create_temp_dir();
        let registry = Arc::new(MemoryRegistry::new(dir.path()));
        let transport = Arc::new(FakeTransport::new());
        let (telemetry, events) = ChannelTelemetry::new();

        let builder = DownloaderBuilder::hidden(registry.clone())
            .fallback_base_url(TEST_BASE_URL)
            // Temp files written by a test must count as fresh.
            .started_at(SystemTime::now() - Duration::from_secs(60))
            .transport(transport.clone())
            .telemetry(Arc::new(telemetry));
        let downloader = f(builder).build().expect("Failed to build downloader");

        Self {
            dir,
            registry,
            transport,
            downloader,
            events,
        }
    }

    /// Register `filename` with the digest of `content` and serve it.
    pub fn add_model(&self, filename: &str, content: &[u8], behavior: Behavior) -> String {
        self.registry
            .insert(ModelInfo::new(filename).with_digest(md5_of(content)));
        let url = model_url(filename);
        self.transport.serve(&url, content.to_vec(), behavior);
        url
    }

    pub fn temp_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(format!("incomplete-{filename}"))
    }

    pub fn install_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(filename)
    }

    /// Wait for the next terminal event of `filename`.
    /// Events already emitted and not yet received.
    pub fn queued_events(&mut self) -> Vec<TelemetryEvent> {
        let mut queued = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            queued.push(event);
        }
        queued
    }

    pub async fn terminal_event(&mut self, filename: &str) -> TelemetryEvent {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let event = events.recv().await.expect("telemetry channel closed");
                if event.is_terminal() && event.filename() == filename {
                    return event;
                }
            }
        })
        .await
        .expect("Timed out waiting for a terminal event")
    }
}

/// Send crate logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn model_url(filename: &str) -> String {
    format!("{TEST_BASE_URL}{filename}")
}

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Creates a temporary file with the given content
pub fn create_temp_file(dir: &Path, filename: &str, content: &[u8]) -> PathBuf {
    let file_path = dir.join(filename);
    fs::write(&file_path, content).expect("Failed to write temporary file");
    file_path
}

/// Creates test file content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

pub fn md5_of(content: &[u8]) -> String {
    md5_hex(&mut Cursor::new(content), BLOCK_SIZE).unwrap()
}

/// Asserts that a file has the expected size
pub fn assert_file_size(path: &Path, expected_size: u64) {
    let metadata = fs::metadata(path).expect("Failed to get file metadata");
    assert_eq!(
        metadata.len(),
        expected_size,
        "File size mismatch at path: {:?}",
        path
    );
}

/// Poll until `path` holds at least `size` bytes.
pub async fn wait_for_size(path: &Path, size: u64) {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if fs::metadata(path).map(|m| m.len() >= size).unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timed out waiting for the temp file to grow")
}
