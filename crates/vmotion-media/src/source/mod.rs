//! Decoded frame sources.
//!
//! A frame source is a scoped handle over a decoded video: it is opened at
//! the start of an analysis, yields frames strictly in order, and is closed
//! on every exit path. Implementations also release their decoder on drop.

mod ffmpeg;
mod memory;
#[cfg(feature = "opencv")]
mod capture;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

pub use self::ffmpeg::{FfmpegFrameSource, FfmpegTools, RawFrameReader};
pub use self::memory::MemoryFrameSource;
#[cfg(feature = "opencv")]
pub use self::capture::OpencvFrameSource;

/// A decoded RGB frame.
pub type Frame = image::RgbImage;

/// Stream metadata reported when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Frame count reported by the container (may be an estimate)
    pub total_frames: u64,
    /// Frames per second
    pub fps: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Sequential access to the frames of one video.
pub trait FrameSource {
    /// Metadata captured at open time.
    fn info(&self) -> &StreamInfo;

    /// Decode the next frame; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Release the decoder. Safe to call more than once.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &StreamInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Open a video file with the compiled-in decoder.
///
/// Uses OpenCV when built with the `opencv` feature, the FFmpeg CLI otherwise.
pub fn open_video(path: impl AsRef<Path>) -> MediaResult<Box<dyn FrameSource>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::NotFound(path.to_path_buf()));
    }

    #[cfg(feature = "opencv")]
    let source: Box<dyn FrameSource> = Box::new(OpencvFrameSource::open(path)?);
    #[cfg(not(feature = "opencv"))]
    let source: Box<dyn FrameSource> = Box::new(FfmpegFrameSource::open(path)?);

    Ok(source)
}
