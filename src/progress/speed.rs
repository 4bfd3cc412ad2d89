//! Progress throttling and transfer speed rendering.
//!
//! Registry progress fields are written at most once per interval per file.
//! The throttle state lives in the registry itself (its `timestamp` and
//! `bytes_received` fields), so these are pure functions over that state.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// What the last registry write recorded for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSample {
    /// Milliseconds since the epoch.
    pub timestamp_ms: i64,
    pub bytes: u64,
}

/// A progress update that passed the throttle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedUpdate {
    pub bytes_per_second: f64,
    pub text: String,
}

/// Decide whether a progress notification at `now_ms` with `current_bytes`
/// on disk is due, and compute the speed since `last` if so.
///
/// Returns `None` when less than `interval` has elapsed since the last write.
pub fn throttled_speed(
    last: LastSample,
    now_ms: i64,
    current_bytes: u64,
    interval: Duration,
) -> Option<SpeedUpdate> {
    let elapsed_ms = now_ms.saturating_sub(last.timestamp_ms);
    let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    if elapsed_ms < interval_ms || elapsed_ms <= 0 {
        return None;
    }

    let bytes_per_second = speed(current_bytes.saturating_sub(last.bytes), elapsed_ms as u64);
    Some(SpeedUpdate {
        bytes_per_second,
        text: format_speed(bytes_per_second),
    })
}

/// Bytes per second from a byte delta over `elapsed_ms` milliseconds.
pub fn speed(delta_bytes: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    delta_bytes as f64 / elapsed_ms as f64 * 1000.0
}

/// Render a speed with 1024-based units and two decimals.
///
/// ```rust
/// use modelfetch::progress::format_speed;
///
/// assert_eq!(format_speed(512.0), "512.00 B/s");
/// assert_eq!(format_speed(1536.0), "1.50 KB/s");
/// assert_eq!(format_speed(3.0 * 1024.0 * 1024.0), "3.00 MB/s");
/// ```
pub fn format_speed(bytes_per_second: f64) -> String {
    if bytes_per_second < KIB {
        format!("{:.2} B/s", bytes_per_second)
    } else if bytes_per_second < MIB {
        format!("{:.2} KB/s", bytes_per_second / KIB)
    } else {
        format!("{:.2} MB/s", bytes_per_second / MIB)
    }
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
