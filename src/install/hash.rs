//! Streaming MD5 over a file.

use md5::{Digest, Md5};
use std::io::{self, Read};

/// Lowercase hex MD5 of everything `reader` yields, read `block_size` bytes
/// at a time.
pub fn md5_hex<R: Read>(reader: &mut R, block_size: usize) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; block_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Case-insensitive hex digest comparison.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
