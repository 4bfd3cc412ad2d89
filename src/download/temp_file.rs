//! The incomplete-download file a transfer writes into.
//!
//! [`TempFile`] is the open, write-positioned handle owned by a transfer
//! task. Closing it yields a [`ClosedTempFile`], which is only a path: it is
//! what gets moved to the hash-and-install worker.

use super::resume::resume_offset;

use std::fs;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// An open temp file positioned at its write cursor.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    file: File,
    position: u64,
}

impl TempFile {
    /// Open (or create) the temp file at `path` and position it for resuming.
    ///
    /// The file is truncated to the resume offset so that bytes discarded by
    /// the stale-file rewind are really gone.
    pub async fn open(path: &Path, process_start: SystemTime, rewind: u64) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        debug!("Opening temp file {:?}", path);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .await?;

        let meta = file.metadata().await?;
        let size = meta.len();
        let offset = resume_offset(size, meta.modified().ok(), process_start, rewind);
        if offset != size {
            warn!(
                "Temp file {:?} predates this process, rewinding from {} to {}",
                path, size, offset
            );
        }

        file.set_len(offset).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            position: offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes on disk, which is also the write position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append one chunk and flush it to the OS.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.file.flush().await?;
        self.position += chunk.len() as u64;
        Ok(())
    }

    /// Drop everything written so far and start over from byte zero.
    pub async fn restart(&mut self) -> io::Result<()> {
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.position = 0;
        Ok(())
    }

    /// Flush and close the handle.
    pub async fn close(mut self) -> io::Result<ClosedTempFile> {
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(ClosedTempFile {
            path: self.path,
            len: self.position,
        })
    }
}

/// A temp file nobody holds open, ready to be verified and installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedTempFile {
    path: PathBuf,
    len: u64,
}

impl ClosedTempFile {
    /// Wrap an existing file on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let len = fs::metadata(&path)?.len();
        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length at the time the file was closed.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reopen read-only. Blocking; only called off the async runtime.
    pub fn reopen(&self) -> io::Result<fs::File> {
        fs::File::open(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incomplete-m.bin");
        let start = SystemTime::now() - Duration::from_secs(60);

        let mut temp = TempFile::open(&path, start, 1024).await.unwrap();
        assert_eq!(temp.position(), 0);
        temp.write_chunk(b"hello ").await.unwrap();
        temp.write_chunk(b"world").await.unwrap();
        let closed = temp.close().await.unwrap();
        assert_eq!(closed.len(), 11);

        // Fresh file: reopened at its full length.
        let mut temp = TempFile::open(&path, start, 1024).await.unwrap();
        assert_eq!(temp.position(), 11);
        temp.write_chunk(b"!").await.unwrap();
        temp.close().await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world!");
    }

    #[tokio::test]
    async fn test_open_truncates_stale_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incomplete-m.bin");
        fs::write(&path, vec![7u8; 3000]).unwrap();

        // Process "started" after the file was written.
        let start = SystemTime::now() + Duration::from_secs(60);
        let mut temp = TempFile::open(&path, start, 1000).await.unwrap();
        assert_eq!(temp.position(), 2000);
        temp.write_chunk(&[1u8; 10]).await.unwrap();
        temp.close().await.unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 2010);
        assert_eq!(&data[2000..], &[1u8; 10]);
    }

    #[tokio::test]
    async fn test_restart_discards_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incomplete-m.bin");
        let mut temp = TempFile::open(&path, SystemTime::UNIX_EPOCH, 0).await.unwrap();
        temp.write_chunk(b"partial").await.unwrap();
        temp.restart().await.unwrap();
        temp.write_chunk(b"full").await.unwrap();
        let closed = temp.close().await.unwrap();
        assert_eq!(fs::read(closed.path()).unwrap(), b"full");
    }
}
