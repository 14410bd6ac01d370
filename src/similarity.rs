//! Histogram-based near-duplicate detection.
//!
//! Two frames are "the same scene" when their 256-bin grayscale intensity
//! histograms, each min-max normalised to `[0, 1]`, have a Pearson
//! correlation strictly above [`SIMILARITY_THRESHOLD`]. The check is global:
//! motion inside a detected region is not distinguished from a frozen
//! background.
//!
//! Grayscale conversion, normalisation and the degenerate-variance rule all
//! follow OpenCV's `cvtColor`/`normalize(NORM_MINMAX)`/`compareHist(CORREL)`
//! so the threshold keeps the meaning it was tuned with.

use image::GrayImage;

use crate::source::Frame;

/// Number of intensity bins, one per 8-bit gray level.
pub const HISTOGRAM_BINS: usize = 256;

/// Correlation above which two frames count as near-duplicates.
pub const SIMILARITY_THRESHOLD: f64 = 0.90;

/// A per-level intensity histogram.
pub type Histogram = [f64; HISTOGRAM_BINS];

/// Convert an RGB frame to 8-bit luma with BT.601 weights.
///
/// Uses the same 14-bit fixed-point coefficients as OpenCV's `RGB2GRAY`.
pub fn to_grayscale(frame: &Frame) -> GrayImage {
    let (width, height) = frame.dimensions();
    let luma: Vec<u8> = frame
        .as_raw()
        .chunks_exact(3)
        .map(|rgb| {
            let weighted =
                rgb[0] as u32 * 4899 + rgb[1] as u32 * 9617 + rgb[2] as u32 * 1868 + (1 << 13);
            (weighted >> 14) as u8
        })
        .collect();
    GrayImage::from_raw(width, height, luma).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Count pixels per gray level over the full `[0, 256)` range.
pub fn luma_histogram(gray: &GrayImage) -> Histogram {
    let mut histogram = [0.0; HISTOGRAM_BINS];
    for &value in gray.as_raw() {
        histogram[value as usize] += 1.0;
    }
    histogram
}

/// Rescale a histogram in place so its minimum becomes 0 and its maximum 1.
///
/// A flat histogram has no range to stretch and collapses to all zeros.
pub fn normalize_min_max(histogram: &mut Histogram) {
    let (min, max) = histogram
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let scale = if range > f64::EPSILON { 1.0 / range } else { 0.0 };
    for bin in histogram.iter_mut() {
        *bin = (*bin - min) * scale;
    }
}

/// Pearson correlation coefficient between two histograms.
///
/// Returns 1.0 when either side has zero variance.
pub fn correlation(a: &Histogram, b: &Histogram) -> f64 {
    let n = HISTOGRAM_BINS as f64;
    let (mut s1, mut s2, mut s11, mut s22, mut s12) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        s1 += x;
        s2 += y;
        s11 += x * x;
        s22 += y * y;
        s12 += x * y;
    }

    let numerator = s12 - s1 * s2 / n;
    let denominator = (s11 - s1 * s1 / n) * (s22 - s2 * s2 / n);
    if denominator.abs() > f64::EPSILON {
        numerator / denominator.sqrt()
    } else {
        1.0
    }
}

/// Returns `true` when `score` strictly exceeds [`SIMILARITY_THRESHOLD`].
pub fn exceeds_threshold(score: f64) -> bool {
    score > SIMILARITY_THRESHOLD
}

/// Full-frame perceptual similarity check.
///
/// Stateless; a [`VideoJob`](crate::VideoJob) only consults it when a previous
/// snapshot exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityGate;

impl SimilarityGate {
    pub fn new() -> Self {
        Self
    }

    /// Normalised-histogram correlation between two frames, in `[-1, 1]`.
    pub fn score(&self, first: &Frame, second: &Frame) -> f64 {
        let mut first_histogram = luma_histogram(&to_grayscale(first));
        let mut second_histogram = luma_histogram(&to_grayscale(second));
        normalize_min_max(&mut first_histogram);
        normalize_min_max(&mut second_histogram);
        correlation(&first_histogram, &second_histogram)
    }

    /// Returns `true` when the two frames are near-duplicates.
    pub fn is_similar(&self, first: &Frame, second: &Frame) -> bool {
        let score = self.score(first, second);
        log::trace!("histogram correlation {score:.4}");
        exceeds_threshold(score)
    }
}
