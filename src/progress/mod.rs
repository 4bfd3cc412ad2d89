//! Progress reporting for transfer sessions.
//!
//! Two kinds of progress come out of a transfer:
//!
//! - registry fields (`bytes_received`, `bytes_total`, `speed`, `timestamp`),
//!   throttled to one write per interval per file by [`throttled_speed`];
//! - terminal progress bars, one per session, managed by [`ProgressDisplay`].
//!
//! # Overview
//!
//! - `speed` - throttle law, speed computation and rendering
//! - `style` - progress bar styling options and templates
//! - `display` - progress bar display management
//!
//! # Examples
//!
//! ## Rendering a Transfer Speed
//!
//! ```rust
//! use modelfetch::progress::{throttled_speed, LastSample};
//! use std::time::Duration;
//!
//! let last = LastSample { timestamp_ms: 1_000, bytes: 0 };
//!
//! // Too early: nothing to write.
//! assert!(throttled_speed(last, 1_500, 512, Duration::from_secs(1)).is_none());
//!
//! let update = throttled_speed(last, 2_000, 1536, Duration::from_secs(1)).unwrap();
//! assert_eq!(update.text, "1.50 KB/s");
//! ```
//!
//! ## Hidden Progress Bars
//!
//! ```rust
//! use modelfetch::progress::{ProgressBarOpts, ProgressDisplay};
//!
//! let display = ProgressDisplay::new(ProgressBarOpts::hidden());
//! let pb = display.create_bar("model.bin", 0);
//! assert!(pb.is_hidden());
//! ```

pub(crate) mod display;
pub(crate) mod speed;
pub(crate) mod style;

pub use display::ProgressDisplay;
pub use speed::{format_speed, now_millis, speed, throttled_speed, LastSample, SpeedUpdate};
pub use style::ProgressBarOpts;
