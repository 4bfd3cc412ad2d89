//! The dedicated hash-and-install thread.
//!
//! Requests come in over an unbounded channel and are processed strictly in
//! send order; each produces exactly one [`VerifyOutcome`] on the outcome
//! channel. The thread exits once every request sender has been dropped.

use super::verify_and_install;
use crate::download::{ClosedTempFile, SessionId};
use crate::error::{Error, Result};

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// A complete temp file to verify and install.
#[derive(Debug)]
pub struct VerifyRequest {
    pub id: SessionId,
    pub filename: String,
    /// Expected hex MD5, empty to skip verification.
    pub expected_digest: String,
    pub save_path: PathBuf,
    pub temp_file: ClosedTempFile,
}

/// Result of one [`VerifyRequest`], with the temp file handed back.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub id: SessionId,
    pub filename: String,
    pub temp_file: ClosedTempFile,
    pub result: Result<()>,
}

/// Handle to the worker thread.
#[derive(Debug)]
pub struct HashAndInstallWorker {
    thread: JoinHandle<()>,
}

impl HashAndInstallWorker {
    /// Start the worker thread.
    ///
    /// Returns the worker, the sender to submit requests with and the
    /// receiver outcomes arrive on.
    pub fn spawn(
        block_size: usize,
    ) -> Result<(
        Self,
        UnboundedSender<VerifyRequest>,
        UnboundedReceiver<VerifyOutcome>,
    )> {
        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<VerifyRequest>();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name("hash-and-save".into())
            .spawn(move || {
                while let Some(req) = req_rx.blocking_recv() {
                    debug!("Verifying {} ({})", req.filename, req.id);
                    let result = verify_and_install(
                        &req.filename,
                        &req.expected_digest,
                        &req.save_path,
                        &req.temp_file,
                        block_size,
                    );
                    let outcome = VerifyOutcome {
                        id: req.id,
                        filename: req.filename,
                        temp_file: req.temp_file,
                        result,
                    };
                    if out_tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("hash-and-save thread exiting");
            })?;

        Ok((Self { thread }, req_tx, out_rx))
    }

    /// Wait for the thread to exit. Blocks; drop every request sender first.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| Error::Internal("hash-and-save thread panicked".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::SessionTable;
    use crate::install::BLOCK_SIZE;
    use std::fs;

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let table = SessionTable::new();
        let (worker, tx, mut rx) = HashAndInstallWorker::spawn(BLOCK_SIZE).unwrap();

        let mut ids = Vec::new();
        for name in ["a.bin", "b.bin", "c.bin"] {
            let temp = dir.path().join(format!("incomplete-{name}"));
            fs::write(&temp, name.as_bytes()).unwrap();
            let id = table.reserve(name).unwrap();
            ids.push(id);
            tx.send(VerifyRequest {
                id,
                filename: name.into(),
                expected_digest: String::new(),
                save_path: dir.path().join(name),
                temp_file: ClosedTempFile::from_path(temp).unwrap(),
            })
            .unwrap();
        }

        for id in ids {
            let outcome = rx.recv().await.unwrap();
            assert_eq!(outcome.id, id);
            assert!(outcome.result.is_ok());
        }
        assert_eq!(fs::read(dir.path().join("b.bin")).unwrap(), b"b.bin");

        drop(tx);
        tokio::task::spawn_blocking(move || worker.join())
            .await
            .unwrap()
            .unwrap();
    }
}
