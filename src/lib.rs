//! # silhouette
//!
//! Scan a directory of videos for people and keep annotated, de-duplicated
//! snapshots of every frame where someone shows up.
//!
//! Each video is decoded with FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate. Every 5th
//! frame goes to a [`Detector`]; frames with at least one region get a red
//! rectangle drawn around each region and are compared with the last snapshot
//! kept for that video using a 256-bin luma histogram correlation. Anything
//! with a correlation of 0.90 or less is written out as
//! `snapshot_<video>_<n>.png`.
//!
//! Videos are processed in parallel on the rayon pool. A video that cannot be
//! opened is logged and skipped; it never stops the others.
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "cascade")]
//! # {
//! use silhouette::{CascadeJobFactory, JobScheduler, ScanOptions};
//!
//! let scheduler = JobScheduler::new(
//!     CascadeJobFactory::new("haarcascade_fullbody.xml"),
//!     "image",
//!     ScanOptions::new(),
//! );
//! let outcome = scheduler.scan_directory("video", "mp4")?;
//! println!("{} snapshot(s) saved", outcome.snapshot_count());
//! # }
//! # Ok::<(), silhouette::SilhouetteError>(())
//! ```
//!
//! ## Bring your own detector
//!
//! The pipeline only depends on the [`FrameSource`] and [`Detector`] traits.
//! Implement [`JobFactory`] to plug in another decoder or detection model.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `cascade` | OpenCV Haar cascade detector, [`CascadeJobFactory`] and the `silhouette` binary |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed. The `cascade` feature also
//! needs OpenCV 4 with `libclang` available for the `opencv` crate's bindings.

pub mod configuration;
pub mod detector;
pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod progress;
pub mod scheduler;
pub mod similarity;
pub mod snapshot;
pub mod source;

pub use configuration::{DEFAULT_BATCH_SIZE, DEFAULT_FRAME_SKIP, ScanOptions, SnapshotFormat};
#[cfg(feature = "cascade")]
pub use detector::CascadeDetector;
pub use detector::{DetectionSet, Detector, Region, annotate};
pub use error::SilhouetteError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use job::{JobReport, JobResult, JobState, VideoJob, process_video};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo, percent_complete};
#[cfg(feature = "cascade")]
pub use scheduler::CascadeJobFactory;
pub use scheduler::{JobFactory, JobScheduler, ScanOutcome, discover_videos};
pub use similarity::{SIMILARITY_THRESHOLD, SimilarityGate};
pub use snapshot::{Snapshot, SnapshotRecord, SnapshotWriter};
pub use source::{Frame, FrameSource, VideoSource};
