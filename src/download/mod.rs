//! Download module containing the transfer-side building blocks.
//!
//! Everything the coordinator needs to drive one transfer up to the point
//! where the complete temp file is handed over for verification.
//!
//! # Overview
//!
//! - [`resume`] - resume offset computation and the `Range` header
//! - [`temp_file`] - the incomplete-download file, open and closed
//! - [`session`] - the table of in-flight transfer sessions
//!
//! # Examples
//!
//! ## Picking a Resume Point
//!
//! ```rust
//! use modelfetch::download::{range_header, resume_offset, STALE_REWIND};
//! use std::time::{Duration, SystemTime};
//!
//! let process_start = SystemTime::now();
//! let modified = process_start - Duration::from_secs(3600);
//!
//! // The file was written by an earlier run: drop its last MiB.
//! let offset = resume_offset(8 * STALE_REWIND, Some(modified), process_start, STALE_REWIND);
//! assert_eq!(range_header(offset), "bytes=7340032-");
//! ```
//!
//! ## Tracking Sessions
//!
//! ```rust
//! use modelfetch::download::{SessionState, SessionTable};
//!
//! let table = SessionTable::new();
//! let id = table.reserve("model.bin").unwrap();
//! assert!(table.reserve("model.bin").is_err());
//!
//! table.set_state(id, SessionState::Downloading);
//! assert_eq!(table.find("model.bin"), Some(id));
//! table.remove(id);
//! assert!(table.is_empty());
//! ```

pub mod resume;
pub mod session;
pub mod temp_file;

pub use resume::{process_start, range_header, resume_offset, STALE_REWIND};
pub use session::{SessionId, SessionState, SessionTable, SessionView, TransferSession};
pub use temp_file::{ClosedTempFile, TempFile};
