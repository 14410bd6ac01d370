//! Sequential frame sources.
//!
//! A [`FrameSource`] hands out decoded frames one at a time, in stream order,
//! until the stream ends. [`VideoSource`] is the FFmpeg-backed implementation
//! used for files on disk; tests and alternative decoders plug in through the
//! trait.
//!
//! # Example
//!
//! ```no_run
//! use silhouette::{FrameSource, VideoSource};
//!
//! let mut source = VideoSource::open("clip.mp4")?;
//! println!("{} frames", source.frame_count());
//! while let Some(frame) = source.next_frame() {
//!     println!("{}x{}", frame.width(), frame.height());
//! }
//! source.release();
//! # Ok::<(), silhouette::SilhouetteError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::error::SilhouetteError;

/// A decoded RGB8 frame.
pub type Frame = RgbImage;

/// Pull-based access to the frames of one video.
pub trait FrameSource {
    /// Total number of frames, or 0 when the source cannot tell.
    fn frame_count(&self) -> u64;

    /// Decode the next frame. `None` means the stream ended or a frame
    /// could not be read, which is treated the same way.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Release the decode handle. Must be safe to call any number of times.
    fn release(&mut self);
}

/// Live FFmpeg state; dropped as a unit on release.
struct DecodeState {
    input: Input,
    decoder: VideoDecoder,
    converter: RgbConverter,
    stream_index: usize,
    decoded_frame: VideoFrame,
    eof_sent: bool,
}

/// Pixel format and size a scaler was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerInput {
    format: Pixel,
    width: u32,
    height: u32,
}

impl ScalerInput {
    fn of(frame: &VideoFrame) -> Self {
        Self {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

/// Converts decoded frames of any format to packed RGB24.
///
/// The scaler is rebuilt whenever a frame's format or size differs from the
/// one it was built for, since streams may change resolution mid-file.
struct RgbConverter {
    scaler: Option<(ScalerInput, ScalingContext)>,
    rgb_frame: VideoFrame,
}

/// FFmpeg-backed [`FrameSource`] that decodes every frame of the best video
/// stream in order.
pub struct VideoSource {
    path: PathBuf,
    frame_count: u64,
    state: Option<DecodeState>,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("frame_count", &self.frame_count)
            .field("open", &self.state.is_some())
            .finish()
    }
}

impl VideoSource {
    /// Open a video file and prepare a decoder for its best video stream.
    ///
    /// # Errors
    ///
    /// Returns [`SilhouetteError::SourceUnavailable`] if FFmpeg cannot open
    /// the file, it has no video stream, or no decoder is available.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SilhouetteError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| SilhouetteError::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let duration_microseconds = input.duration();
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable(SilhouetteError::NoVideoStream.to_string()))?;
        let stream_index = stream.index();

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if frames_per_second > 0.0 && duration_microseconds > 0 {
            (duration_microseconds as f64 / 1_000_000.0 * frames_per_second) as u64
        } else {
            0
        };

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unavailable(format!("Failed to create video decoder: {error}")))?;

        log::debug!(
            "{}: stream {stream_index}, {}x{}, {frame_count} frames",
            path.display(),
            decoder.width(),
            decoder.height(),
        );

        Ok(Self {
            path,
            frame_count,
            state: Some(DecodeState {
                input,
                decoder,
                converter: RgbConverter::new(),
                stream_index,
                decoded_frame: VideoFrame::empty(),
                eof_sent: false,
            }),
        })
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the decode handle is still held.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl DecodeState {
    fn next_frame(&mut self, path: &Path) -> Option<Frame> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.converter.convert(&self.decoded_frame) {
                    Ok(frame) => Some(frame),
                    Err(error) => {
                        log::warn!("{}: {error}; ending stream", path.display());
                        None
                    }
                };
            }

            if self.eof_sent {
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            log::warn!("{}: decoder rejected packet: {error}", path.display());
                            return None;
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if self.decoder.send_eof().is_err() {
                        return None;
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::warn!("{}: unreadable packet: {error}", path.display());
                    return None;
                }
            }
        }
    }
}

impl RgbConverter {
    fn new() -> Self {
        Self {
            scaler: None,
            rgb_frame: VideoFrame::empty(),
        }
    }

    fn convert(&mut self, decoded: &VideoFrame) -> Result<Frame, SilhouetteError> {
        let input = ScalerInput::of(decoded);
        let scaler = match &mut self.scaler {
            Some((built_for, scaler)) if *built_for == input => scaler,
            slot => {
                if let Some((built_for, _)) = slot.as_ref() {
                    log::debug!(
                        "frame geometry changed from {}x{} {:?} to {}x{} {:?}",
                        built_for.width,
                        built_for.height,
                        built_for.format,
                        input.width,
                        input.height,
                        input.format,
                    );
                }
                let scaler = ScalingContext::get(
                    input.format,
                    input.width,
                    input.height,
                    Pixel::RGB24,
                    input.width,
                    input.height,
                    ScalingFlags::BILINEAR,
                )?;
                // The old output buffer has the previous size.
                self.rgb_frame = VideoFrame::empty();
                &mut slot.insert((input, scaler)).1
            }
        };
        scaler.run(decoded, &mut self.rgb_frame)?;

        let buffer = frame_to_buffer(&self.rgb_frame, input.width, input.height, 3);
        RgbImage::from_raw(input.width, input.height, buffer).ok_or_else(|| {
            SilhouetteError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

impl FrameSource for VideoSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let path = &self.path;
        self.state.as_mut()?.next_frame(path)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::debug!("Released video source: {}", self.path.display());
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn rational_to_f64(rate: Rational) -> Option<f64> {
    (rate.denominator() != 0 && rate.numerator() > 0)
        .then(|| rate.numerator() as f64 / rate.denominator() as f64)
}

/// Copy pixel data out of a possibly padded FFmpeg plane into a tightly
/// packed buffer.
fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        data.chunks(stride)
            .take(height as usize)
            .flat_map(|row| &row[..row_bytes])
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_yuv_frame(width: u32, height: u32) -> VideoFrame {
        let mut frame = VideoFrame::new(Pixel::YUV420P, width, height);
        for plane in 0..frame.planes() {
            frame.data_mut(plane).fill(128);
        }
        frame
    }

    #[test]
    fn converter_follows_resolution_changes() {
        let mut converter = RgbConverter::new();

        let small = converter.convert(&gray_yuv_frame(32, 24)).unwrap();
        assert_eq!(small.dimensions(), (32, 24));

        let large = converter.convert(&gray_yuv_frame(64, 48)).unwrap();
        assert_eq!(large.dimensions(), (64, 48));
        assert_eq!(
            converter.scaler.as_ref().map(|(built_for, _)| *built_for),
            Some(ScalerInput {
                format: Pixel::YUV420P,
                width: 64,
                height: 48,
            })
        );

        let small_again = converter.convert(&gray_yuv_frame(32, 24)).unwrap();
        assert_eq!(small_again, small);
    }

    #[test]
    fn converter_follows_pixel_format_changes() {
        let mut converter = RgbConverter::new();
        converter.convert(&gray_yuv_frame(16, 16)).unwrap();

        let mut rgb = VideoFrame::new(Pixel::RGB24, 16, 16);
        rgb.data_mut(0).fill(90);
        let image = converter.convert(&rgb).unwrap();

        assert_eq!(image.dimensions(), (16, 16));
        assert!(image.pixels().all(|pixel| pixel.0 == [90, 90, 90]));
    }

    #[test]
    fn rational_rejects_degenerate_rates() {
        assert_eq!(rational_to_f64(Rational::new(30, 1)), Some(30.0));
        assert_eq!(rational_to_f64(Rational::new(0, 1)), None);
        assert_eq!(rational_to_f64(Rational::new(25, 0)), None);
    }
}
