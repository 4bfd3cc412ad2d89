//! Where to resume a partial download from.

use std::sync::OnceLock;
use std::time::SystemTime;

/// Bytes discarded from a temp file left over by an earlier process.
pub const STALE_REWIND: u64 = 1024 * 1024;

static PROCESS_START: OnceLock<SystemTime> = OnceLock::new();

/// When this process first asked for its start time.
///
/// Fixed on the first call, so every downloader built in one process shares
/// the same stale temp file cutoff.
pub fn process_start() -> SystemTime {
    *PROCESS_START.get_or_init(SystemTime::now)
}

/// Compute the resume offset for a temp file of `size` bytes.
///
/// A temp file last modified before `process_start` may have been cut off
/// mid-write, so its last `rewind` bytes (or all of it, when smaller) are
/// discarded. A file whose modification time cannot be read is treated the
/// same way.
///
/// ```rust
/// use modelfetch::download::resume_offset;
/// use std::time::{Duration, SystemTime};
///
/// let start = SystemTime::now();
/// let earlier = start - Duration::from_secs(60);
///
/// assert_eq!(resume_offset(5_000_000, Some(earlier), start, 1 << 20), 5_000_000 - (1 << 20));
/// assert_eq!(resume_offset(5_000_000, Some(start), start, 1 << 20), 5_000_000);
/// assert_eq!(resume_offset(1000, Some(earlier), start, 1 << 20), 0);
/// ```
pub fn resume_offset(
    size: u64,
    modified: Option<SystemTime>,
    process_start: SystemTime,
    rewind: u64,
) -> u64 {
    if size == 0 {
        return 0;
    }
    match modified {
        Some(mtime) if mtime >= process_start => size,
        _ => size.saturating_sub(rewind),
    }
}

/// The `Range` header value asking for everything from `offset` on.
pub fn range_header(offset: u64) -> String {
    format!("bytes={}-", offset)
}
