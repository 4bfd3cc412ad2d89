//! Shared utility functions.
//!
//! - [`content_length`] - Content-Range parsing and total size extraction

pub mod content_length;

pub use content_length::{parse_content_range_total, total_size, ContentRange};
