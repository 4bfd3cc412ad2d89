//! Error handling for modelfetch.
//!
//! Every failure the download engine can run into is a variant of [`Error`].
//! None of them are fatal to the process: the coordinator records the
//! rendered message in the registry's `download_error` field and logs it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can happen while downloading, verifying or installing a model.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from an underlying system.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The model URL (or the fallback base URL) cannot be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A transfer session already exists for this filename.
    #[error("a download of {0} is already in progress")]
    AlreadyActive(String),

    /// The registry does not know this filename.
    #[error("could not find model {0} in the registry")]
    UnknownTarget(String),

    /// The incomplete-download file could not be opened for writing.
    #[error("could not open temp file {} for {filename}: {source}", path.display())]
    TempFileOpen {
        filename: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transport failed or the server answered with an error status.
    #[error("network error occurred attempting to download {filename} code: {code} {message}")]
    Network {
        filename: String,
        code: u16,
        message: String,
    },

    /// The digest of the completed temp file differs from the expected one.
    #[error("MD5SUM did not match: {actual} != {expected} for {filename}")]
    DigestMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// The closed temp file could not be reopened for hashing or copying.
    #[error("could not reopen temp file {}: {source}", path.display())]
    Reopen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The verified file could not be written to its final location.
    #[error("could not save model to {}: failed with code {}", path.display(), source.raw_os_error().unwrap_or(-1))]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O Error.
    #[error("I/O error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library.
    #[error("Reqwest Error")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
}

impl Error {
    /// Numeric code carried by network and save failures.
    ///
    /// For [`Error::Network`] this is the HTTP status, or `0` when the
    /// failure happened below HTTP. For [`Error::Save`] it is the OS error
    /// code. Other variants have no code.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Network { code, .. } => Some(i32::from(*code)),
            Error::Save { source, .. } => Some(source.raw_os_error().unwrap_or(-1)),
            _ => None,
        }
    }
}

/// Result type alias for modelfetch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_code() {
        let e = Error::Network {
            filename: "m.bin".into(),
            code: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(e.code(), Some(503));
        assert!(e.to_string().contains("m.bin"));
        assert!(e.to_string().contains("503"));
    }

    #[test]
    fn test_digest_mismatch_message_carries_both_values() {
        let e = Error::DigestMismatch {
            filename: "m.bin".into(),
            expected: "aaa".into(),
            actual: "bbb".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("aaa"));
        assert!(msg.contains("bbb"));
        assert_eq!(e.code(), None);
    }

    #[test]
    fn test_save_code_from_os_error() {
        let e = Error::Save {
            path: PathBuf::from("/nope/m.bin"),
            source: io::Error::from_raw_os_error(13),
        };
        assert_eq!(e.code(), Some(13));
    }
}
