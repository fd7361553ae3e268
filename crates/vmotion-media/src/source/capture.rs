//! Frame source backed by OpenCV `VideoCapture`.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH,
};
use tracing::debug;

use super::{Frame, FrameSource, StreamInfo};
use crate::error::{MediaError, MediaResult};

/// Decodes a video file through OpenCV.
pub struct OpencvFrameSource {
    path: PathBuf,
    info: StreamInfo,
    cap: Option<VideoCapture>,
}

impl OpencvFrameSource {
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }

        let name = path
            .to_str()
            .ok_or_else(|| MediaError::unreadable(format!("{}: non UTF-8 path", path.display())))?;

        let cap = VideoCapture::from_file(name, CAP_ANY)
            .map_err(|e| MediaError::unreadable(format!("{}: {e}", path.display())))?;
        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::unreadable(path.display().to_string()));
        }

        let prop = |id| cap.get(id).unwrap_or(0.0);
        let frame_count = prop(CAP_PROP_FRAME_COUNT);
        let info = StreamInfo {
            total_frames: if frame_count > 0.0 { frame_count.round() as u64 } else { 0 },
            fps: prop(CAP_PROP_FPS),
            width: prop(CAP_PROP_FRAME_WIDTH).max(0.0) as u32,
            height: prop(CAP_PROP_FRAME_HEIGHT).max(0.0) as u32,
        };

        debug!(
            path = %path.display(),
            total_frames = info.total_frames,
            fps = info.fps,
            "Opened video with OpenCV"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            cap: Some(cap),
        })
    }

    fn to_rgb(&self, frame: &Mat) -> MediaResult<Frame> {
        let code = match frame.channels() {
            1 => imgproc::COLOR_GRAY2RGB,
            3 => imgproc::COLOR_BGR2RGB,
            4 => imgproc::COLOR_BGRA2RGB,
            n => {
                return Err(MediaError::unreadable(format!(
                    "{}: unsupported channel count {n}",
                    self.path.display()
                )))
            }
        };

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(frame, &mut rgb, code)
            .map_err(|e| MediaError::unreadable(format!("Color conversion: {e}")))?;

        let width = rgb.cols().max(0) as u32;
        let height = rgb.rows().max(0) as u32;
        let bytes = rgb
            .data_bytes()
            .map_err(|e| MediaError::unreadable(format!("Frame data: {e}")))?
            .to_vec();

        Frame::from_raw(width, height, bytes)
            .ok_or_else(|| MediaError::unreadable("Decoded frame has an unexpected size"))
    }
}

impl FrameSource for OpencvFrameSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let Some(cap) = self.cap.as_mut() else {
            return Ok(None);
        };

        let mut frame = Mat::default();
        let grabbed = cap
            .read(&mut frame)
            .map_err(|e| MediaError::unreadable(format!("{}: {e}", self.path.display())))?;

        if !grabbed || frame.empty() {
            return Ok(None);
        }

        self.to_rgb(&frame).map(Some)
    }

    fn close(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            let _ = cap.release();
        }
    }
}

impl Drop for OpencvFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
