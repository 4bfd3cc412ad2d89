//! Content-Range parsing and total size extraction.
//!
//! A ranged response advertises the *remaining* byte count in its
//! Content-Length, while the full file size sits after the `/` of its
//! Content-Range header. These helpers recover the real total.

/// A parsed `Content-Range` header value.
///
/// `start`/`end` are `None` for the unsatisfied form `bytes */<total>`, and
/// `total` is `None` when the server sends `*` as the complete length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parse `bytes <start>-<end>/<total>` or `bytes */<total>`.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = rest.split_once('/')?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse::<u64>().ok()?),
        };
        let (start, end) = match range.trim() {
            "*" => (None, None),
            r => {
                let (s, e) = r.split_once('-')?;
                (Some(s.trim().parse().ok()?), Some(e.trim().parse().ok()?))
            }
        };
        Some(Self { start, end, total })
    }
}

/// Parse Content-Range header to extract total size.
///
/// Only the part after the last `/` is looked at, so a malformed range part
/// still yields the total.
///
/// ```rust
/// use modelfetch::utils::parse_content_range_total;
///
/// assert_eq!(parse_content_range_total("bytes 0-1023/2048"), Some(2048));
/// assert_eq!(parse_content_range_total("bytes 0-1023"), None);
/// ```
pub fn parse_content_range_total(content_range: &str) -> Option<u64> {
    let (_, total) = content_range.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// Work out the full size of the file being fetched.
///
/// Prefers the total from `content_range`; otherwise the advertised
/// `content_length` is the remainder after `offset`.
pub fn total_size(content_length: Option<u64>, content_range: Option<&str>, offset: u64) -> Option<u64> {
    content_range
        .and_then(parse_content_range_total)
        .or_else(|| content_length.map(|len| len.saturating_add(offset)))
}
