//! Parallel, failure-isolated scheduling of video jobs.
//!
//! [`JobScheduler`] runs one [`VideoJob`](crate::VideoJob) per video on the
//! rayon pool. Jobs share nothing mutable: each worker asks the
//! [`JobFactory`] for its own frame source and its own detector, and writes
//! into the shared output directory under names unique to its video.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cascade")]
//! # {
//! use silhouette::{CascadeJobFactory, JobScheduler, ScanOptions, ScanOutcome};
//!
//! let factory = CascadeJobFactory::new("haarcascade_fullbody.xml");
//! let scheduler = JobScheduler::new(factory, "image", ScanOptions::new());
//!
//! match scheduler.scan_directory("video", "mp4")? {
//!     ScanOutcome::NoVideos => println!("No video files found."),
//!     ScanOutcome::Completed(results) => {
//!         for result in &results {
//!             println!("{}: {} snapshot(s)", result.video.display(), result.snapshot_count());
//!         }
//!     }
//! }
//! # }
//! # Ok::<(), silhouette::SilhouetteError>(())
//! ```

use std::{
    any::Any,
    fs,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::configuration::ScanOptions;
use crate::detector::Detector;
use crate::error::SilhouetteError;
use crate::job::{JobResult, JobState, process_video};
use crate::snapshot::SnapshotWriter;
use crate::source::FrameSource;

/// Builds the per-job resources.
///
/// Shared by reference across worker threads, so implementations hold only
/// read-only configuration (paths, constants). The objects they produce stay
/// on the worker that asked for them.
pub trait JobFactory: Sync {
    type Source: FrameSource;
    type Detector: Detector;

    /// Open a frame source for one video.
    fn open_source(&self, video: &Path) -> Result<Self::Source, SilhouetteError>;

    /// Build a fresh detector for one job.
    fn create_detector(&self) -> Result<Self::Detector, SilhouetteError>;

    /// Check run-wide preconditions once, before any job starts.
    fn validate(&self) -> Result<(), SilhouetteError> {
        Ok(())
    }
}

/// Terminal outcome of a scheduler run.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Nothing to do: the discovered set was empty.
    NoVideos,
    /// Every video reached `Closed` or `Failed`.
    Completed(Vec<JobResult>),
}

impl ScanOutcome {
    pub fn results(&self) -> &[JobResult] {
        match self {
            ScanOutcome::NoVideos => &[],
            ScanOutcome::Completed(results) => results,
        }
    }

    /// Snapshots written across all videos.
    pub fn snapshot_count(&self) -> u64 {
        self.results().iter().map(JobResult::snapshot_count).sum()
    }

    /// Jobs that ended with an error.
    pub fn failed_count(&self) -> usize {
        self.results().iter().filter(|result| !result.is_success()).count()
    }
}

/// Runs one job per video, in parallel, with per-file failure isolation.
pub struct JobScheduler<F: JobFactory> {
    factory: F,
    writer: SnapshotWriter,
    options: ScanOptions,
}

impl<F: JobFactory> JobScheduler<F> {
    /// `output_directory` must already exist.
    pub fn new<P: Into<PathBuf>>(factory: F, output_directory: P, options: ScanOptions) -> Self {
        let writer = SnapshotWriter::new(output_directory, options.snapshot_format);
        Self {
            factory,
            writer,
            options,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Process every video in `videos`.
    ///
    /// # Errors
    ///
    /// Only run-wide preconditions fail the whole run (for example
    /// [`SilhouetteError::ModelLoad`] from [`JobFactory::validate`]); per-video
    /// errors land in the matching [`JobResult`].
    pub fn run(&self, videos: &[PathBuf]) -> Result<ScanOutcome, SilhouetteError> {
        if videos.is_empty() {
            log::info!("No video files found");
            return Ok(ScanOutcome::NoVideos);
        }

        self.factory.validate()?;
        log::info!("Scanning {} video(s)", videos.len());

        let results: Vec<JobResult> = videos.par_iter().map(|video| self.run_one(video)).collect();

        let failed = results.iter().filter(|result| !result.is_success()).count();
        log::info!(
            "Finished {} video(s): {} failed",
            results.len(),
            failed
        );
        Ok(ScanOutcome::Completed(results))
    }

    /// Discover videos under `root` and process them.
    pub fn scan_directory<P: AsRef<Path>>(
        &self,
        root: P,
        extension: &str,
    ) -> Result<ScanOutcome, SilhouetteError> {
        let videos = discover_videos(root, extension)?;
        self.run(&videos)
    }

    fn run_one(&self, video: &Path) -> JobResult {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            process_video(&self.factory, video, &self.writer, &self.options)
        }));

        attempt.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            log::error!("Job for {} panicked: {message}", video.display());
            JobResult {
                video: video.to_path_buf(),
                state: JobState::Failed,
                outcome: Err(SilhouetteError::JobPanicked(message)),
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Recursively collect files under `root` whose extension matches
/// `extension` (case-insensitive, with or without a leading dot).
///
/// Results are sorted. Unreadable subdirectories are skipped with a warning.
///
/// # Errors
///
/// Returns [`SilhouetteError::IoError`] if `root` itself cannot be read.
pub fn discover_videos<P: AsRef<Path>>(
    root: P,
    extension: &str,
) -> Result<Vec<PathBuf>, SilhouetteError> {
    let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
    let mut videos = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];
    let mut is_root = true;

    while let Some(directory) = pending.pop() {
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(error) if is_root => return Err(error.into()),
            Err(error) => {
                log::warn!("Skipping {}: {error}", directory.display());
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().to_ascii_lowercase() == wanted)
            {
                videos.push(path);
            }
        }
    }

    videos.sort();
    log::debug!(
        "Discovered {} .{wanted} file(s) under {}",
        videos.len(),
        root.as_ref().display()
    );
    Ok(videos)
}

#[cfg(feature = "cascade")]
pub use cascade::CascadeJobFactory;

#[cfg(feature = "cascade")]
mod cascade {
    use std::path::{Path, PathBuf};

    use super::JobFactory;
    use crate::detector::CascadeDetector;
    use crate::error::SilhouetteError;
    use crate::source::VideoSource;

    /// FFmpeg decoding plus one OpenCV cascade per job, all loaded from the
    /// same read-only definition file.
    #[derive(Debug, Clone)]
    pub struct CascadeJobFactory {
        cascade_path: PathBuf,
    }

    impl CascadeJobFactory {
        pub fn new<P: Into<PathBuf>>(cascade_path: P) -> Self {
            Self {
                cascade_path: cascade_path.into(),
            }
        }
    }

    impl JobFactory for CascadeJobFactory {
        type Source = VideoSource;
        type Detector = CascadeDetector;

        fn open_source(&self, video: &Path) -> Result<VideoSource, SilhouetteError> {
            VideoSource::open(video)
        }

        fn create_detector(&self) -> Result<CascadeDetector, SilhouetteError> {
            CascadeDetector::load(&self.cascade_path)
        }

        fn validate(&self) -> Result<(), SilhouetteError> {
            CascadeDetector::load(&self.cascade_path).map(drop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").expect("Failed to create file");
    }

    #[test]
    fn discover_videos_walks_subdirectories() {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let nested = root.path().join("cam1").join("day2");
        fs::create_dir_all(&nested).expect("Failed to create dirs");

        touch(&root.path().join("b.mp4"));
        touch(&root.path().join("a.MP4"));
        touch(&nested.join("c.mp4"));
        touch(&nested.join("notes.txt"));
        touch(&root.path().join("mp4"));

        let videos = discover_videos(root.path(), "mp4").expect("discovery failed");
        let names: Vec<String> = videos
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(videos.len(), 3);
        assert!(names.contains(&"a.MP4".to_string()));
        assert!(names.contains(&"b.mp4".to_string()));
        assert!(names.contains(&"c.mp4".to_string()));
        let mut sorted = videos.clone();
        sorted.sort();
        assert_eq!(videos, sorted);
    }

    #[test]
    fn discover_videos_accepts_dotted_extension() {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        touch(&root.path().join("clip.avi"));
        touch(&root.path().join("clip.mp4"));

        let videos = discover_videos(root.path(), ".avi").expect("discovery failed");
        assert_eq!(videos, vec![root.path().join("clip.avi")]);
    }

    #[test]
    fn discover_videos_in_empty_directory() {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let videos = discover_videos(root.path(), "mp4").expect("discovery failed");
        assert!(videos.is_empty());
    }

    #[test]
    fn discover_videos_missing_root_is_an_error() {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let result = discover_videos(root.path().join("nope"), "mp4");
        assert!(matches!(result, Err(SilhouetteError::IoError(_))));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
