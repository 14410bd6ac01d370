//! In-memory frame sources, detectors and callbacks shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::Rgb;
use silhouette::{
    DetectionSet, Detector, Frame, FrameSource, JobFactory, ProgressCallback, ProgressInfo, Region,
    SilhouetteError, SnapshotRecord,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 64;
pub const DARK: u8 = 20;
pub const BRIGHT: u8 = 230;

/// The region every detector double reports.
pub const PERSON: Region = Region {
    x: 10,
    y: 10,
    width: 20,
    height: 20,
};

/// A flat frame whose top-left pixel carries `index` in its red channel so
/// tests can tell which frame a detector was handed.
pub fn marked_frame(index: u8, background: u8) -> Frame {
    let mut frame = Frame::from_pixel(WIDTH, HEIGHT, Rgb([background, background, background]));
    frame.put_pixel(0, 0, Rgb([index, background, background]));
    frame
}

pub fn frame_marker(frame: &Frame) -> u64 {
    u64::from(frame.get_pixel(0, 0)[0])
}

/// `count` dark frames, numbered from 1.
pub fn dark_frames(count: u8) -> Vec<Frame> {
    (1..=count).map(|index| marked_frame(index, DARK)).collect()
}

/// Frames 1..=19 dark, frame 20 bright.
pub fn dark_then_bright() -> Vec<Frame> {
    (1..=20_u8)
        .map(|index| marked_frame(index, if index == 20 { BRIGHT } else { DARK }))
        .collect()
}

/// Plays back a fixed list of frames.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    frame_count: u64,
    releases: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frame_count: frames.len() as u64,
            frames: frames.into(),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report a frame count other than the real one; 0 means unknown.
    pub fn with_frame_count(mut self, frame_count: u64) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    fn release(&mut self) {
        self.frames.clear();
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

type Response = Box<dyn FnMut(u64) -> Result<DetectionSet, SilhouetteError> + Send>;

/// Records the marker of every frame it sees and answers via `respond`.
pub struct RecordingDetector {
    seen: Arc<Mutex<Vec<u64>>>,
    respond: Response,
}

impl RecordingDetector {
    pub fn new<F>(respond: F) -> Self
    where
        F: FnMut(u64) -> Result<DetectionSet, SilhouetteError> + Send + 'static,
    {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            respond: Box::new(respond),
        }
    }

    /// Finds [`PERSON`] in every frame.
    pub fn always() -> Self {
        Self::new(|_| Ok(vec![PERSON]))
    }

    /// Never finds anything.
    pub fn never() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<u64>>> {
        self.seen.clone()
    }
}

impl Detector for RecordingDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, SilhouetteError> {
        let marker = frame_marker(frame);
        self.seen.lock().unwrap().push(marker);
        (self.respond)(marker)
    }
}

/// Collects every callback for later inspection.
#[derive(Default)]
pub struct RecordingProgress {
    pub infos: Mutex<Vec<ProgressInfo>>,
    pub snapshots: Mutex<Vec<SnapshotRecord>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }

    fn on_snapshot(&self, snapshot: &SnapshotRecord) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

impl RecordingProgress {
    pub fn percentages_for(&self, video: &str) -> Vec<Option<u8>> {
        self.infos
            .lock()
            .unwrap()
            .iter()
            .filter(|info| info.video == video)
            .map(|info| info.percentage)
            .collect()
    }
}

/// Serves scripted frames keyed by video file stem.
///
/// Stems starting with `broken` fail to open and stems starting with `panic`
/// panic while opening.
pub struct ScriptedFactory {
    pub videos: HashMap<String, Vec<Frame>>,
    pub model_ok: bool,
    pub validations: AtomicUsize,
    pub detectors_built: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            videos: HashMap::new(),
            model_ok: true,
            validations: AtomicUsize::new(0),
            detectors_built: AtomicUsize::new(0),
        }
    }

    pub fn with_video(mut self, stem: &str, frames: Vec<Frame>) -> Self {
        self.videos.insert(stem.to_string(), frames);
        self
    }

    pub fn with_broken_model(mut self) -> Self {
        self.model_ok = false;
        self
    }
}

impl JobFactory for ScriptedFactory {
    type Source = ScriptedSource;
    type Detector = RecordingDetector;

    fn open_source(&self, video: &Path) -> Result<ScriptedSource, SilhouetteError> {
        let stem = video
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        if stem.starts_with("panic") {
            panic!("decoder exploded on {stem}");
        }
        if stem.starts_with("broken") {
            return Err(SilhouetteError::SourceUnavailable {
                path: video.to_path_buf(),
                reason: "moov atom not found".to_string(),
            });
        }

        let frames = self.videos.get(&stem).cloned().unwrap_or_default();
        Ok(ScriptedSource::new(frames))
    }

    fn create_detector(&self) -> Result<RecordingDetector, SilhouetteError> {
        self.detectors_built.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingDetector::always())
    }

    fn validate(&self) -> Result<(), SilhouetteError> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        if self.model_ok {
            Ok(())
        } else {
            Err(SilhouetteError::ModelLoad {
                path: "haarcascade_fullbody.xml".into(),
                reason: "file not found".to_string(),
            })
        }
    }
}
