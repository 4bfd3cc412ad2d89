//! Verification and installation of complete temp files.
//!
//! Once a transfer has written the last byte, the closed temp file is
//! re-read to compute its MD5, compared with the digest the registry
//! expects, and moved to its final location. All of this is blocking I/O
//! and runs on the [`HashAndInstallWorker`] thread, never on the runtime.
//!
//! Installing prefers an atomic rename. When that fails (typically because
//! the install directory sits on another filesystem) the file is copied and
//! the temp file is removed only after the copy was fully written.
//!
//! # Examples
//!
//! ```rust
//! use modelfetch::download::ClosedTempFile;
//! use modelfetch::install::{verify_and_install, BLOCK_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let temp = dir.path().join("incomplete-model.bin");
//! std::fs::write(&temp, b"The quick brown fox jumps over the lazy dog")?;
//!
//! let save_path = dir.path().join("model.bin");
//! verify_and_install(
//!     "model.bin",
//!     "9e107d9d372bb6826bd81d3542a419d6",
//!     &save_path,
//!     &ClosedTempFile::from_path(&temp)?,
//!     BLOCK_SIZE,
//! )?;
//! assert!(save_path.exists());
//! assert!(!temp.exists());
//! # Ok(())
//! # }
//! ```

pub mod hash;
pub mod worker;

pub use hash::{digests_match, md5_hex};
pub use worker::{HashAndInstallWorker, VerifyOutcome, VerifyRequest};

use crate::download::ClosedTempFile;
use crate::error::{Error, Result};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Block size used to hash and copy files.
pub const BLOCK_SIZE: usize = 16 * 1024;

/// Verify the digest of `temp` and install it at `save_path`.
///
/// An empty `expected_digest` never matches. On a digest mismatch the temp
/// file is deleted; on a save failure it is kept.
pub fn verify_and_install(
    filename: &str,
    expected_digest: &str,
    save_path: &Path,
    temp: &ClosedTempFile,
    block_size: usize,
) -> Result<()> {
    verify(filename, expected_digest, temp, block_size)?;
    install_with(temp.path(), save_path, block_size, |from, to| fs::rename(from, to))
}

fn verify(filename: &str, expected: &str, temp: &ClosedTempFile, block_size: usize) -> Result<()> {
    let reopen_err = |source| Error::Reopen {
        path: temp.path().to_path_buf(),
        source,
    };
    let mut file = temp.reopen().map_err(reopen_err)?;
    let actual = md5_hex(&mut file, block_size).map_err(reopen_err)?;
    drop(file);

    if digests_match(expected, &actual) {
        debug!("Digest of {} verified: {}", filename, actual);
        return Ok(());
    }

    if let Err(e) = fs::remove_file(temp.path()) {
        warn!("Could not remove corrupt temp file {:?}: {}", temp.path(), e);
    }
    Err(Error::DigestMismatch {
        filename: filename.to_string(),
        expected: expected.trim().to_lowercase(),
        actual,
    })
}

/// Move `src` to `dst` with `rename`, falling back to a block copy.
///
/// The copy goes to a hidden sibling of `dst` that is renamed into place once
/// synced, so `dst` never exists half written. `src` is removed only after
/// that rename.
pub fn install_with<F>(src: &Path, dst: &Path, block_size: usize, rename: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let save_err = |source| Error::Save {
        path: dst.to_path_buf(),
        source,
    };

    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir).map_err(save_err)?;
    }

    match rename(src, dst) {
        Ok(()) => {
            debug!("Renamed {:?} to {:?}", src, dst);
            return Ok(());
        }
        Err(e) => debug!("Rename of {:?} failed ({}), copying instead", src, e),
    }

    let partial = partial_copy_path(dst);
    let copied = copy_blocks(src, &partial, block_size, save_err)
        .and_then(|()| fs::rename(&partial, dst).map_err(save_err));
    if let Err(e) = copied {
        if let Err(rm) = fs::remove_file(&partial) {
            if rm.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove partial copy {:?}: {}", partial, rm);
            }
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_file(src) {
        warn!("Installed {:?} but could not remove {:?}: {}", dst, src, e);
    }
    Ok(())
}

/// `<dir>/.<filename>.copy`, skipped by directory scans.
fn partial_copy_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{name}.copy"))
}

fn copy_blocks(
    src: &Path,
    to: &Path,
    block_size: usize,
    save_err: impl Fn(io::Error) -> Error,
) -> Result<()> {
    let reopen_err = |source| Error::Reopen {
        path: src.to_path_buf(),
        source,
    };
    let mut input = File::open(src).map_err(reopen_err)?;
    let mut output = File::create(to).map_err(&save_err)?;

    let mut buf = vec![0u8; block_size.max(1)];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(reopen_err(source)),
        };
        output.write_all(&buf[..n]).map_err(&save_err)?;
    }
    output.flush().map_err(&save_err)?;
    output.sync_all().map_err(&save_err)?;
    Ok(())
}
