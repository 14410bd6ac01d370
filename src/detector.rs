//! Human-figure detection and frame annotation.
//!
//! A [`Detector`] turns one frame into a [`DetectionSet`]. The production
//! implementation, [`CascadeDetector`] (feature `cascade`), runs an OpenCV
//! cascade classifier over the grayscale frame with fixed parameters:
//! [`SCALE_FACTOR`], [`MIN_NEIGHBORS`] and a [`MIN_REGION_SIZE`] square.
//!
//! Each [`VideoJob`](crate::VideoJob) owns its own detector; instances are
//! never shared between threads.
//!
//! [`annotate`] keeps the whole stroke inside the detected region. OpenCV's
//! `rectangle` centres a thick stroke on the border instead, so outlines here
//! sit one pixel further in than OpenCV would draw them, and nothing outside
//! a region is ever painted.

use image::Rgb;

use crate::error::SilhouetteError;
use crate::source::Frame;

/// Search-window shrink factor between cascade passes.
pub const SCALE_FACTOR: f64 = 1.1;

/// Overlapping candidates required before a window counts as a detection.
pub const MIN_NEIGHBORS: i32 = 5;

/// Smallest detectable region edge, in pixels.
pub const MIN_REGION_SIZE: u32 = 50;

/// Outline colour baked into persisted snapshots.
pub const ANNOTATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline thickness, in pixels.
pub const ANNOTATION_THICKNESS: u32 = 2;

/// An axis-aligned bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Regions found in one frame, in detector order. Empty means nothing found.
pub type DetectionSet = Vec<Region>;

/// Finds human figures in a frame.
pub trait Detector {
    /// Detect regions in `frame`. The frame is not modified.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, SilhouetteError>;
}

/// Draw the outline of every region into `frame`.
///
/// Outlines are [`ANNOTATION_THICKNESS`] pixels wide, drawn inside the region
/// and clipped to the frame bounds.
pub fn annotate(frame: &mut Frame, regions: &[Region]) {
    let (frame_width, frame_height) = frame.dimensions();

    for region in regions {
        if region.width == 0 || region.height == 0 {
            continue;
        }
        let (left, top) = (region.x, region.y);
        let far_x = region.x.saturating_add(region.width);
        let far_y = region.y.saturating_add(region.height);
        let right = far_x.min(frame_width);
        let bottom = far_y.min(frame_height);
        if left >= right || top >= bottom {
            continue;
        }

        let edge = ANNOTATION_THICKNESS;
        for y in top..bottom {
            for x in left..right {
                let on_border = x < left + edge
                    || x + edge >= far_x
                    || y < top + edge
                    || y + edge >= far_y;
                if on_border {
                    frame.put_pixel(x, y, ANNOTATION_COLOR);
                }
            }
        }
    }
}

#[cfg(feature = "cascade")]
pub use cascade::CascadeDetector;

#[cfg(feature = "cascade")]
mod cascade {
    use std::fmt::{Debug, Formatter, Result as FmtResult};
    use std::path::{Path, PathBuf};

    use opencv::{
        core::{Mat, Rect, Size, Vector},
        objdetect::{self, CascadeClassifier},
        prelude::*,
    };

    use super::{Detector, DetectionSet, MIN_NEIGHBORS, MIN_REGION_SIZE, Region, SCALE_FACTOR};
    use crate::error::SilhouetteError;
    use crate::similarity::to_grayscale;
    use crate::source::Frame;

    /// OpenCV cascade classifier (Haar or LBP) loaded from an XML definition.
    pub struct CascadeDetector {
        classifier: CascadeClassifier,
        path: PathBuf,
    }

    impl Debug for CascadeDetector {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            f.debug_struct("CascadeDetector")
                .field("path", &self.path)
                .finish_non_exhaustive()
        }
    }

    impl CascadeDetector {
        /// Load a cascade definition.
        ///
        /// # Errors
        ///
        /// Returns [`SilhouetteError::ModelLoad`] if the file is missing, its
        /// path is not UTF-8, or OpenCV cannot parse it.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SilhouetteError> {
            let path = path.as_ref().to_path_buf();
            let model_error = |reason: String| SilhouetteError::ModelLoad {
                path: path.clone(),
                reason,
            };

            if !path.is_file() {
                return Err(model_error("file not found".to_string()));
            }
            let path_str = path
                .to_str()
                .ok_or_else(|| model_error("path is not valid UTF-8".to_string()))?;

            let classifier =
                CascadeClassifier::new(path_str).map_err(|error| model_error(error.to_string()))?;
            if classifier.empty().map_err(|error| model_error(error.to_string()))? {
                return Err(model_error("not a valid cascade definition".to_string()));
            }

            log::debug!("Loaded cascade classifier: {}", path.display());
            Ok(Self { classifier, path })
        }

        /// Path the cascade was loaded from.
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Detector for CascadeDetector {
        fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, SilhouetteError> {
            let gray = to_grayscale(frame);
            let (width, height) = gray.dimensions();
            let image = Mat::new_rows_cols_with_data(height as i32, width as i32, gray.as_raw())?
                .try_clone()?;

            let mut objects = Vector::<Rect>::new();
            self.classifier.detect_multi_scale(
                &image,
                &mut objects,
                SCALE_FACTOR,
                MIN_NEIGHBORS,
                objdetect::CASCADE_SCALE_IMAGE,
                Size::new(MIN_REGION_SIZE as i32, MIN_REGION_SIZE as i32),
                Size::default(),
            )?;

            Ok(objects
                .iter()
                .map(|rect| {
                    Region::new(
                        rect.x.max(0) as u32,
                        rect.y.max(0) as u32,
                        rect.width.max(0) as u32,
                        rect.height.max(0) as u32,
                    )
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;

    fn blank(width: u32, height: u32) -> Frame {
        RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
    }

    #[test]
    fn annotate_draws_two_pixel_outline() {
        let mut frame = blank(40, 40);
        annotate(&mut frame, &[Region::new(10, 10, 10, 10)]);

        assert_eq!(*frame.get_pixel(10, 10), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(11, 15), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(19, 19), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(18, 15), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(12, 12), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(9, 9), Rgb([0, 0, 0]));
    }

    #[test]
    fn annotate_counts_border_pixels() {
        let mut frame = blank(40, 40);
        annotate(&mut frame, &[Region::new(5, 5, 10, 10)]);
        let painted = frame.pixels().filter(|p| **p == ANNOTATION_COLOR).count();
        assert_eq!(painted, 10 * 10 - 6 * 6);
    }

    #[test]
    fn annotate_never_paints_outside_the_region() {
        let mut frame = blank(40, 40);
        let region = Region::new(10, 12, 15, 9);
        annotate(&mut frame, &[region]);

        for (x, y, pixel) in frame.enumerate_pixels() {
            let inside = (10..25).contains(&x) && (12..21).contains(&y);
            if !inside {
                assert_eq!(*pixel, Rgb([0, 0, 0]), "painted ({x}, {y})");
            }
        }
        // Both stroke rows sit on or inside each edge.
        for y in [12, 13, 19, 20] {
            assert_eq!(*frame.get_pixel(17, y), ANNOTATION_COLOR, "row {y}");
        }
        for x in [10, 11, 23, 24] {
            assert_eq!(*frame.get_pixel(x, 16), ANNOTATION_COLOR, "column {x}");
        }
        assert_eq!(*frame.get_pixel(12, 14), Rgb([0, 0, 0]));
    }

    #[test]
    fn annotate_clips_to_frame() {
        let mut frame = blank(20, 20);
        annotate(&mut frame, &[Region::new(15, 15, 30, 30)]);

        assert_eq!(*frame.get_pixel(15, 15), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(16, 19), ANNOTATION_COLOR);
        assert_eq!(*frame.get_pixel(19, 19), Rgb([0, 0, 0]));
    }

    #[test]
    fn annotate_ignores_regions_outside_frame() {
        let mut frame = blank(10, 10);
        let before = frame.clone();
        annotate(&mut frame, &[Region::new(50, 50, 5, 5), Region::new(2, 2, 0, 4)]);
        assert_eq!(frame, before);
    }

    #[test]
    fn annotate_with_no_regions_is_noop() {
        let mut frame = blank(8, 8);
        let before = frame.clone();
        annotate(&mut frame, &[]);
        assert_eq!(frame, before);
    }
}
