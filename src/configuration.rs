//! Scan configuration.
//!
//! [`ScanOptions`] is a builder that threads progress callbacks, cancellation
//! tokens, and sampling/output settings through the scheduler and every
//! [`VideoJob`](crate::VideoJob) without widening each signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use silhouette::{CancellationToken, ProgressCallback, ProgressInfo, ScanOptions, SnapshotFormat};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}: frame {}", info.video, info.frame_index);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ScanOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_snapshot_format(SnapshotFormat::Jpeg);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use image::ImageFormat;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Every Nth pulled frame is submitted to the detector.
pub const DEFAULT_FRAME_SKIP: u64 = 5;

/// Indeterminate progress is reported every this many frames.
pub const DEFAULT_BATCH_SIZE: u64 = 30;

/// Image encoding used for persisted snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// Baseline JPEG.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
}

impl SnapshotFormat {
    /// File extension written after the sequence number.
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Png => "png",
            SnapshotFormat::Jpeg => "jpg",
            SnapshotFormat::Bmp => "bmp",
        }
    }

    /// Parse a user-supplied extension such as `"png"`, `".JPG"` or `"jpeg"`.
    pub fn from_extension(value: &str) -> Option<Self> {
        match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(SnapshotFormat::Png),
            "jpg" | "jpeg" => Some(SnapshotFormat::Jpeg),
            "bmp" => Some(SnapshotFormat::Bmp),
            _ => None,
        }
    }

    pub(crate) fn to_image_format(self) -> ImageFormat {
        match self {
            SnapshotFormat::Png => ImageFormat::Png,
            SnapshotFormat::Jpeg => ImageFormat::Jpeg,
            SnapshotFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

/// Operational settings for a scan.
///
/// All fields have defaults matching the fixed pipeline: every 5th frame is
/// sampled, snapshots are PNG, progress is discarded and nothing cancels.
#[derive(Clone)]
pub struct ScanOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) frame_skip: u64,
    pub(crate) batch_size: u64,
    pub(crate) snapshot_format: SnapshotFormat,
}

impl Debug for ScanOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("frame_skip", &self.frame_skip)
            .field("batch_size", &self.batch_size)
            .field("snapshot_format", &self.snapshot_format)
            .finish_non_exhaustive()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            frame_skip: DEFAULT_FRAME_SKIP,
            batch_size: DEFAULT_BATCH_SIZE,
            snapshot_format: SnapshotFormat::default(),
        }
    }

    /// Attach a progress callback shared by every job.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, each running job stops before pulling its
    /// next frame and reports [`SilhouetteError::Cancelled`](crate::SilhouetteError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the sampling interval. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_frame_skip(mut self, frame_skip: u64) -> Self {
        self.frame_skip = frame_skip.max(1);
        self
    }

    /// Set how often indeterminate progress fires (every N frames).
    ///
    /// Only used for sources that cannot report a frame count. Clamped to a
    /// minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the image encoding of persisted snapshots.
    #[must_use]
    pub fn with_snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshot_format = format;
        self
    }

    /// The configured sampling interval.
    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    /// The configured snapshot encoding.
    pub fn snapshot_format(&self) -> SnapshotFormat {
        self.snapshot_format
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
