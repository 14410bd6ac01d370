//! Snapshot persistence.
//!
//! [`SnapshotWriter`] writes accepted frames into a shared output directory as
//! `snapshot_<video-stem>_<sequence>.<ext>`. Sequence numbers are per video,
//! start at 0 and only advance on successful writes, so names never collide
//! across concurrently running jobs.

use std::path::PathBuf;

use crate::configuration::SnapshotFormat;
use crate::error::SilhouetteError;
use crate::source::Frame;

/// Where and how a snapshot ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// File name of the source video.
    pub video: String,
    /// Per-video sequence number used in the file name.
    pub sequence: u64,
    /// 1-based index of the frame the snapshot was taken from.
    pub frame_index: u64,
    /// Path of the written image.
    pub path: PathBuf,
}

/// The last accepted, already persisted frame of a job.
///
/// Kept only as the baseline for the next similarity check; replacing it
/// drops the previous image.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub record: SnapshotRecord,
    pub image: Frame,
}

/// Writes annotated frames into an existing output directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    output_directory: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotWriter {
    /// The directory must already exist; creating it is up to the caller.
    pub fn new<P: Into<PathBuf>>(output_directory: P, format: SnapshotFormat) -> Self {
        Self {
            output_directory: output_directory.into(),
            format,
        }
    }

    /// Destination for snapshot `sequence` of the video with stem `video_stem`.
    pub fn snapshot_path(&self, video_stem: &str, sequence: u64) -> PathBuf {
        self.output_directory.join(format!(
            "snapshot_{video_stem}_{sequence}.{}",
            self.format.extension()
        ))
    }

    /// Encode `frame` and create or overwrite its snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`SilhouetteError::Write`] if encoding or writing fails.
    pub fn write(
        &self,
        frame: &Frame,
        video_stem: &str,
        sequence: u64,
    ) -> Result<PathBuf, SilhouetteError> {
        let path = self.snapshot_path(video_stem, sequence);
        frame
            .save_with_format(&path, self.format.to_image_format())
            .map_err(|error| SilhouetteError::Write {
                path: path.clone(),
                reason: error.to_string(),
            })?;
        Ok(path)
    }
}
