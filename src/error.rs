//! Error types for the `silhouette` crate.
//!
//! This module defines [`SilhouetteError`], the unified error type returned by
//! every fallible operation in the crate. Per-video failures are caught at the
//! job boundary and turned into a [`JobResult`](crate::JobResult); only
//! run-wide preconditions (such as the classifier failing to load) surface
//! from [`JobScheduler::run`](crate::JobScheduler::run) itself.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `silhouette` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SilhouetteError {
    /// The video could not be opened or its decoder could not be set up.
    #[error("Failed to open video at {path}: {reason}")]
    SourceUnavailable {
        /// Path of the video that failed to open.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The classifier definition is missing or malformed.
    #[error("Failed to load classifier from {path}: {reason}")]
    ModelLoad {
        /// Path of the cascade definition.
        path: PathBuf,
        /// Underlying reason the load failed.
        reason: String,
    },

    /// A snapshot image could not be written.
    #[error("Failed to write snapshot to {path}: {reason}")]
    Write {
        /// Destination that was being written.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The detector failed while processing a frame.
    #[error("Detection failed: {0}")]
    Detection(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while walking directories or touching files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A job panicked; the panic was contained to that video.
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for SilhouetteError {
    fn from(error: FfmpegError) -> Self {
        SilhouetteError::FfmpegError(error.to_string())
    }
}

#[cfg(feature = "cascade")]
impl From<opencv::Error> for SilhouetteError {
    fn from(error: opencv::Error) -> Self {
        SilhouetteError::Detection(error.to_string())
    }
}
