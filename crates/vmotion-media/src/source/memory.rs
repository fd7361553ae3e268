//! In-memory frame source over pre-decoded frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Frame, FrameSource, StreamInfo};
use crate::error::MediaResult;

/// Frame source backed by a list of frames.
///
/// The declared [`StreamInfo`] is reported as-is, so callers can describe
/// streams whose metadata disagrees with the frames actually delivered.
#[derive(Debug)]
pub struct MemoryFrameSource {
    info: StreamInfo,
    frames: VecDeque<Frame>,
    closed: Arc<AtomicBool>,
}

impl MemoryFrameSource {
    /// Create a source with explicit metadata.
    pub fn new(info: StreamInfo, frames: Vec<Frame>) -> Self {
        Self {
            info,
            frames: frames.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a source whose metadata is derived from the frames.
    pub fn from_frames(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let info = StreamInfo {
            total_frames: frames.len() as u64,
            fps,
            width,
            height,
        };
        Self::new(info, frames)
    }

    /// Shared flag that flips to `true` once the source is closed.
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FrameSource for MemoryFrameSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.is_closed() {
            return Ok(None);
        }
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.frames.clear();
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for MemoryFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_yields_frames_in_order_then_ends() {
        let frames = (0..3u8)
            .map(|i| RgbImage::from_pixel(2, 2, Rgb([i, i, i])))
            .collect();
        let mut source = MemoryFrameSource::from_frames(frames, 30.0);

        assert_eq!(source.info().total_frames, 3);
        assert_eq!(source.info().width, 2);
        for i in 0..3u8 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.get_pixel(0, 0), &Rgb([i, i, i]));
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_close_flag_set_on_drop() {
        let source = MemoryFrameSource::from_frames(Vec::new(), 25.0);
        let flag = source.close_flag();
        assert!(!flag.load(Ordering::SeqCst));
        drop(source);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_closed_source_yields_nothing() {
        let frames = vec![RgbImage::new(1, 1)];
        let mut source = MemoryFrameSource::from_frames(frames, 25.0);
        source.close();
        source.close();
        assert!(source.is_closed());
        assert!(source.next_frame().unwrap().is_none());
    }
}
