//! Terminal progress bars for the transfer sessions.
//!
//! [`ProgressDisplay`] owns an [`indicatif::MultiProgress`] and hands out one
//! child bar per session. Bars are driven from the temp file position, so a
//! resumed download starts its bar at the resume offset.
//!
//! # Examples
//!
//! ```rust
//! use modelfetch::progress::{ProgressBarOpts, ProgressDisplay};
//!
//! let display = ProgressDisplay::new(ProgressBarOpts::hidden());
//!
//! let pb = display.create_bar("model.bin", 4096);
//! display.update(&pb, 1024, Some(8192));
//! display.set_verifying(&pb);
//! display.finish(&pb, "installed");
//! ```

use crate::progress::ProgressBarOpts;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::sync::Arc;

/// Progress display manager that coordinates the session bars.
#[derive(Debug, Clone)]
pub struct ProgressDisplay {
    /// The multi-progress instance every session bar is added to.
    multi: Arc<MultiProgress>,
    /// Style options for the session bars.
    opts: ProgressBarOpts,
}

impl ProgressDisplay {
    /// Create a new progress display manager.
    pub fn new(opts: ProgressBarOpts) -> Self {
        // Prepare the progress bar.
        let multi = match opts.is_enabled() {
            true => Arc::new(MultiProgress::new()),
            false => Arc::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden())),
        };

        Self { multi, opts }
    }

    /// Get the multi-progress instance.
    pub fn multi(&self) -> Arc<MultiProgress> {
        self.multi.clone()
    }

    /// Create the bar of a new session.
    ///
    /// The length is unknown until the first response arrives; the bar starts
    /// at `position`, the resume offset.
    pub fn create_bar(&self, filename: &str, position: u64) -> ProgressBar {
        let pb = self
            .multi
            .add(self.opts.to_progress_bar(0).with_position(position));
        pb.set_message(filename.to_string());
        pb
    }

    /// Move a bar to the temp file position, learning the total on the way.
    pub fn update(&self, pb: &ProgressBar, position: u64, total: Option<u64>) {
        if let Some(total) = total {
            if pb.length() != Some(total) {
                pb.set_length(total);
            }
        }
        pb.set_position(position);
    }

    /// Switch a bar to the verification phase.
    pub fn set_verifying(&self, pb: &ProgressBar) {
        let name = pb.message();
        pb.set_message(format!("{name} (verifying)"));
    }

    /// Finish a bar based on configuration, leaving `outcome` as its message
    /// when it is kept on screen.
    pub fn finish(&self, pb: &ProgressBar, outcome: &str) {
        if self.opts.clear {
            pb.finish_and_clear();
        } else {
            let name = pb.message();
            let name = name.trim_end_matches(" (verifying)");
            pb.finish_with_message(format!("{name} {outcome}"));
        }
        self.multi.remove(pb);
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new(ProgressBarOpts::default())
    }
}
