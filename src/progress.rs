//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for observing per-video scan
//! progress and saved snapshots, [`CancellationToken`] for cooperative
//! cancellation, and [`ProgressInfo`] for individual progress updates.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use silhouette::{ProgressCallback, ProgressInfo, ScanOptions, SnapshotRecord};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("Processing {}: {pct:>3}%", info.video);
//!         }
//!     }
//!
//!     fn on_snapshot(&self, snapshot: &SnapshotRecord) {
//!         println!("Snapshot saved: {}", snapshot.path.display());
//!     }
//! }
//!
//! let options = ScanOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::snapshot::SnapshotRecord;

/// A single progress update for one video.
///
/// Percentages are non-decreasing and never repeated within one video.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// File name of the video being scanned.
    pub video: String,
    /// 1-based index of the most recently pulled frame (0 before the first).
    pub frame_index: u64,
    /// Total frame count reported by the source, if known.
    pub total_frames: Option<u64>,
    /// Completion percentage (0 – 100), if `total_frames` is known.
    pub percentage: Option<u8>,
    /// Wall-clock time elapsed since scanning started.
    pub elapsed: Duration,
}

/// Trait for receiving progress and snapshot notifications.
///
/// Implementations must be [`Send`] and [`Sync`] because one callback is
/// shared by every job running on the worker pool.
///
/// Callbacks are **infallible**: they observe but cannot halt a scan. Use
/// [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the progress value of a video changes.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called after a snapshot has been written successfully.
    fn on_snapshot(&self, _snapshot: &SnapshotRecord) {}
}

/// A no-op implementation that discards all notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone the token and share it between threads; calling
/// [`cancel`](CancellationToken::cancel) from anywhere stops every job that
/// was configured with it at the top of its next scanning step.
///
/// # Example
///
/// ```
/// use silhouette::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor of `frame_index / total_frames * 100`, capped at 100.
///
/// Frame counts can be estimates, so an index past the reported total is
/// reported as complete rather than overshooting.
pub fn percent_complete(frame_index: u64, total_frames: u64) -> Option<u8> {
    if total_frames == 0 {
        return None;
    }
    let percent = frame_index.saturating_mul(100) / total_frames;
    Some(percent.min(100) as u8)
}

/// Per-job helper that turns pulled-frame counts into deduplicated
/// progress callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    video: String,
    total: Option<u64>,
    batch_size: u64,
    last_percentage: Option<u8>,
    start_time: Instant,
}

impl ProgressTracker {
    /// A `total_frames` of 0 means the count is unknown; progress is then
    /// reported as a frame index every `batch_size` frames.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        video: String,
        total_frames: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            video,
            total: (total_frames > 0).then_some(total_frames),
            batch_size: batch_size.max(1),
            last_percentage: None,
            start_time: Instant::now(),
        }
    }

    /// Emit the initial 0% when the total is known.
    pub(crate) fn start(&mut self) {
        self.start_time = Instant::now();
        if self.total.is_some() {
            self.last_percentage = Some(0);
            self.report(0, Some(0));
        }
    }

    /// Record that frame `frame_index` (1-based) has been pulled.
    pub(crate) fn advance(&mut self, frame_index: u64) {
        match self.total {
            Some(total) => {
                let percentage = percent_complete(frame_index, total);
                if percentage != self.last_percentage {
                    self.last_percentage = percentage;
                    self.report(frame_index, percentage);
                }
            }
            None => {
                if frame_index % self.batch_size == 0 {
                    self.report(frame_index, None);
                }
            }
        }
    }

    fn report(&self, frame_index: u64, percentage: Option<u8>) {
        let info = ProgressInfo {
            video: self.video.clone(),
            frame_index,
            total_frames: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
        };
        self.callback.on_progress(&info);
    }
}
