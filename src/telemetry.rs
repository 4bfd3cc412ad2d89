//! Fire-and-forget download lifecycle events.
//!
//! The coordinator reports starts, cancellations, completions, errors and
//! removals through a [`Telemetry`] sink. Emitting never blocks and never fails.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// A download lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    DownloadStarted { filename: String },
    DownloadCancelled { filename: String },
    DownloadFinished { filename: String, success: bool },
    DownloadError { filename: String, code: i32, message: String },
    /// An installed file was deleted by `remove_model`.
    ModelRemoved { filename: String },
}

impl TelemetryEvent {
    /// The file the event is about.
    pub fn filename(&self) -> &str {
        match self {
            TelemetryEvent::DownloadStarted { filename }
            | TelemetryEvent::DownloadCancelled { filename }
            | TelemetryEvent::DownloadFinished { filename, .. }
            | TelemetryEvent::DownloadError { filename, .. }
            | TelemetryEvent::ModelRemoved { filename } => filename,
        }
    }

    /// `true` for the events that end a transfer session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TelemetryEvent::DownloadCancelled { .. }
                | TelemetryEvent::DownloadFinished { .. }
                | TelemetryEvent::DownloadError { .. }
        )
    }
}

/// Sink for [`TelemetryEvent`]s.
///
/// Implementations must not block: they are called from the async runtime.
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Logs every event at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::DownloadStarted { filename } => {
                info!(%filename, "download started")
            }
            TelemetryEvent::DownloadCancelled { filename } => {
                info!(%filename, "download cancelled")
            }
            TelemetryEvent::DownloadFinished { filename, success } => {
                info!(%filename, success, "download finished")
            }
            TelemetryEvent::DownloadError {
                filename,
                code,
                message,
            } => info!(%filename, code, %message, "download error"),
            TelemetryEvent::ModelRemoved { filename } => {
                info!(%filename, "model removed")
            }
        }
    }
}

/// Forwards every event into an unbounded channel.
///
/// Handy to await lifecycle transitions from the outside.
#[derive(Debug, Clone)]
pub struct ChannelTelemetry {
    tx: UnboundedSender<TelemetryEvent>,
}

impl ChannelTelemetry {
    pub fn new() -> (Self, UnboundedReceiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Telemetry for ChannelTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
