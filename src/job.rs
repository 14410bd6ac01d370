//! Per-video processing.
//!
//! A [`VideoJob`] drives one video through
//! `Opening → Scanning → (Detecting → Comparing → Writing)* → Draining → Closed`,
//! or ends in `Failed` when the source cannot be opened.
//!
//! Frames are counted from 1 as they are pulled. Only frames whose index is a
//! multiple of the frame skip reach the detector, so with the default skip of
//! 5 a 12-frame video is sampled at frames 5 and 10. A sampled frame with at
//! least one detection is annotated and then accepted if no snapshot has been
//! kept yet, or if it is not a near-duplicate of the last kept snapshot.
//!
//! # Example
//!
//! ```no_run
//! use silhouette::{ScanOptions, SnapshotWriter, VideoJob, VideoSource};
//! # use silhouette::{Detector, DetectionSet, Frame, SilhouetteError};
//! # struct Nobody;
//! # impl Detector for Nobody {
//! #     fn detect(&mut self, _: &Frame) -> Result<DetectionSet, SilhouetteError> { Ok(Vec::new()) }
//! # }
//!
//! let options = ScanOptions::new();
//! let writer = SnapshotWriter::new("image", options.snapshot_format());
//! let source = VideoSource::open("video/lobby.mp4")?;
//! let mut job = VideoJob::new("video/lobby.mp4", source, Nobody, writer, options);
//! let report = job.run()?;
//! println!("{} snapshot(s)", report.snapshots_saved());
//! # Ok::<(), SilhouetteError>(())
//! ```

use std::path::{Path, PathBuf};

use crate::configuration::ScanOptions;
use crate::detector::{Detector, annotate};
use crate::error::SilhouetteError;
use crate::progress::ProgressTracker;
use crate::similarity::SimilarityGate;
use crate::snapshot::{Snapshot, SnapshotRecord, SnapshotWriter};
use crate::source::{Frame, FrameSource};

/// Lifecycle of a [`VideoJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Acquiring the frame source and detector.
    Opening,
    /// Pulling frames.
    Scanning,
    /// Running the detector on a sampled frame.
    Detecting,
    /// Checking an annotated frame against the last snapshot.
    Comparing,
    /// Persisting an accepted frame.
    Writing,
    /// Releasing the source, detector and retained snapshot.
    Draining,
    /// All resources released.
    Closed,
    /// The source could not be opened. Terminal.
    Failed,
}

/// Counters for one finished video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Frames pulled from the source.
    pub frames_read: u64,
    /// Frames handed to the detector.
    pub frames_sampled: u64,
    /// Sampled frames with at least one region.
    pub frames_with_detections: u64,
    /// Detections dropped as near-duplicates of the last snapshot.
    pub duplicates_skipped: u64,
    /// Accepted frames whose write failed.
    pub write_failures: u64,
    /// Snapshots written, in sequence order.
    pub snapshots: Vec<SnapshotRecord>,
}

impl JobReport {
    /// Number of snapshots written.
    pub fn snapshots_saved(&self) -> u64 {
        self.snapshots.len() as u64
    }
}

/// Outcome of one video, as collected by the scheduler.
#[derive(Debug)]
pub struct JobResult {
    /// The video this job was created for, as discovered on disk.
    pub video: PathBuf,
    /// [`JobState::Closed`] once the job ran, [`JobState::Failed`] if it
    /// never got past opening.
    pub state: JobState,
    /// Per-video counters, or the error that stopped the job. A job that
    /// ran to the end of its video is `Ok` even if some writes failed.
    pub outcome: Result<JobReport, SilhouetteError>,
}

impl JobResult {
    /// `true` when the job finished without a per-video error.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Snapshots written, or 0 for a failed job.
    pub fn snapshot_count(&self) -> u64 {
        self.outcome
            .as_ref()
            .map_or(0, |report| report.snapshots_saved())
    }
}

/// Processes a single video with exclusively owned resources.
pub struct VideoJob<S: FrameSource, D: Detector> {
    video: PathBuf,
    video_name: String,
    video_stem: String,
    source: Option<S>,
    detector: Option<D>,
    gate: SimilarityGate,
    writer: SnapshotWriter,
    options: ScanOptions,
    last_snapshot: Option<Snapshot>,
    next_sequence: u64,
    state: JobState,
}

impl<S: FrameSource, D: Detector> VideoJob<S, D> {
    /// Assemble a job from an already opened source and a detector.
    pub fn new<P: Into<PathBuf>>(
        video: P,
        source: S,
        detector: D,
        writer: SnapshotWriter,
        options: ScanOptions,
    ) -> Self {
        let video = video.into();
        Self {
            video_name: display_name(&video),
            video_stem: video_stem(&video),
            video,
            source: Some(source),
            detector: Some(detector),
            gate: SimilarityGate::new(),
            writer,
            options,
            last_snapshot: None,
            next_sequence: 0,
            state: JobState::Opening,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// The retained baseline snapshot, if any. Always `None` once closed.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// Scan the whole video, then release every resource.
    ///
    /// Write failures are counted and scanning continues. Resources are
    /// released on every exit path.
    ///
    /// # Errors
    ///
    /// - [`SilhouetteError::Cancelled`] if the configured token fires.
    /// - [`SilhouetteError::Detection`] if the detector fails.
    pub fn run(&mut self) -> Result<JobReport, SilhouetteError> {
        let mut report = JobReport::default();
        let result = self.scan(&mut report);
        self.drain();

        match &result {
            Ok(()) => log::info!(
                "{}: {} frame(s), {} snapshot(s) saved",
                self.video_name,
                report.frames_read,
                report.snapshots_saved()
            ),
            Err(error) => log::warn!("{}: stopped early: {error}", self.video_name),
        }
        result.map(|()| report)
    }

    fn scan(&mut self, report: &mut JobReport) -> Result<(), SilhouetteError> {
        let total_frames = self.source.as_ref().map_or(0, |source| source.frame_count());
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            self.video_name.clone(),
            total_frames,
            self.options.batch_size,
        );

        self.state = JobState::Scanning;
        tracker.start();

        let frame_skip = self.options.frame_skip;
        let mut frame_index = 0_u64;
        loop {
            if self.options.is_cancelled() {
                return Err(SilhouetteError::Cancelled);
            }

            let Some(frame) = self.source.as_mut().and_then(|source| source.next_frame()) else {
                break;
            };
            frame_index += 1;
            report.frames_read += 1;

            if frame_index % frame_skip == 0 {
                report.frames_sampled += 1;
                self.process_sample(frame, frame_index, report)?;
                self.state = JobState::Scanning;
            }

            tracker.advance(frame_index);
        }

        Ok(())
    }

    fn process_sample(
        &mut self,
        mut frame: Frame,
        frame_index: u64,
        report: &mut JobReport,
    ) -> Result<(), SilhouetteError> {
        self.state = JobState::Detecting;
        let Some(detector) = self.detector.as_mut() else {
            return Ok(());
        };
        let regions = detector.detect(&frame)?;
        if regions.is_empty() {
            return Ok(());
        }
        report.frames_with_detections += 1;
        annotate(&mut frame, &regions);

        self.state = JobState::Comparing;
        if let Some(previous) = &self.last_snapshot {
            if self.gate.is_similar(&previous.image, &frame) {
                log::debug!(
                    "{}: frame {frame_index} is a near-duplicate of snapshot {}",
                    self.video_name,
                    previous.record.sequence
                );
                report.duplicates_skipped += 1;
                return Ok(());
            }
        }

        self.state = JobState::Writing;
        let sequence = self.next_sequence;
        match self.writer.write(&frame, &self.video_stem, sequence) {
            Ok(path) => {
                log::debug!("{}: wrote {}", self.video_name, path.display());
                let record = SnapshotRecord {
                    video: self.video_name.clone(),
                    sequence,
                    frame_index,
                    path,
                };
                self.options.progress.on_snapshot(&record);
                report.snapshots.push(record.clone());
                self.next_sequence += 1;
                self.last_snapshot = Some(Snapshot {
                    record,
                    image: frame,
                });
            }
            Err(error) => {
                log::warn!("{}: {error}", self.video_name);
                report.write_failures += 1;
            }
        }

        Ok(())
    }

    fn drain(&mut self) {
        self.state = JobState::Draining;
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.detector = None;
        self.last_snapshot = None;
        self.state = JobState::Closed;
    }
}

/// Open resources for `video` through `factory` and run it to completion.
///
/// Never returns an error directly: an unreadable source or detector failure
/// becomes the [`JobResult::outcome`].
pub fn process_video<F: crate::scheduler::JobFactory + ?Sized>(
    factory: &F,
    video: &Path,
    writer: &SnapshotWriter,
    options: &ScanOptions,
) -> JobResult {
    let opened = factory.open_source(video).and_then(|source| {
        factory
            .create_detector()
            .map(|detector| VideoJob::new(video, source, detector, writer.clone(), options.clone()))
    });

    let (state, outcome) = match opened {
        Ok(mut job) => {
            let outcome = job.run();
            (job.state(), outcome)
        }
        Err(error) => {
            log::error!("Unable to process {}: {error}", video.display());
            (JobState::Failed, Err(error))
        }
    };

    JobResult {
        video: video.to_path_buf(),
        state,
        outcome,
    }
}

fn display_name(video: &Path) -> String {
    video
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| video.display().to_string())
}

fn video_stem(video: &Path) -> String {
    video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}
