//! Frame source backed by the FFmpeg CLI.
//!
//! Stream metadata comes from FFprobe; frames are decoded by an `ffmpeg`
//! child process writing raw `rgb24` to its stdout.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use super::{Frame, FrameSource, StreamInfo};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video_with;

/// Locations of the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Find both executables on `PATH`.
    pub fn locate() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let ffprobe = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Splits a raw `rgb24` byte stream into frames.
#[derive(Debug)]
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    frame_len: usize,
    frames_read: u64,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            frame_len: width as usize * height as usize * 3,
            frames_read: 0,
        }
    }

    /// Complete frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame; `Ok(None)` at end of stream.
    ///
    /// A partial trailing frame is discarded with a warning.
    pub fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.frame_len == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let filled = self.fill(&mut buf).map_err(|e| MediaError::DecodeFailed {
            frame: self.frames_read + 1,
            message: e.to_string(),
        })?;

        if filled < self.frame_len {
            if filled > 0 {
                warn!(
                    frame = self.frames_read + 1,
                    bytes = filled,
                    expected = self.frame_len,
                    "Discarding truncated trailing frame"
                );
            }
            return Ok(None);
        }

        let frame = Frame::from_raw(self.width, self.height, buf).ok_or_else(|| {
            MediaError::DecodeFailed {
                frame: self.frames_read + 1,
                message: "decoded frame has an unexpected size".to_string(),
            }
        })?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Decodes a video file through an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: StreamInfo,
    child: Option<Child>,
    frames: Option<RawFrameReader<ChildStdout>>,
    /// Captured stderr; a file so the child never blocks on a full pipe
    stderr: Option<File>,
    frames_read: u64,
}

impl FfmpegFrameSource {
    /// Probe and start decoding `path` with the tools found on `PATH`.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }

        Self::open_with(path, &FfmpegTools::locate()?)
    }

    /// Probe and start decoding `path` with the given executables.
    pub fn open_with(path: impl AsRef<Path>, tools: &FfmpegTools) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }

        let probe = probe_video_with(&tools.ffprobe, path)?;

        if probe.width == 0 || probe.height == 0 {
            return Err(MediaError::unreadable(format!(
                "{}: video stream has no dimensions",
                path.display()
            )));
        }

        let info = StreamInfo {
            total_frames: probe.frame_count,
            fps: probe.fps,
            width: probe.width,
            height: probe.height,
        };

        let start_failed = |e: io::Error| {
            MediaError::unreadable(format!("{}: failed to start ffmpeg: {e}", path.display()))
        };

        let stderr = tempfile::tempfile().map_err(start_failed)?;
        let mut child = Command::new(&tools.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr.try_clone().map_err(start_failed)?))
            .spawn()
            .map_err(start_failed)?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaError::unreadable("FFmpeg stdout was not captured"));
        };

        debug!(
            path = %path.display(),
            total_frames = info.total_frames,
            fps = info.fps,
            width = info.width,
            height = info.height,
            "Opened video with FFmpeg"
        );

        Ok(Self {
            path: path.to_path_buf(),
            frames: Some(RawFrameReader::new(stdout, info.width, info.height)),
            info,
            child: Some(child),
            stderr: Some(stderr),
            frames_read: 0,
        })
    }

    /// Reap the decoder at end of stream and surface a failed exit.
    fn finish(&mut self) -> MediaResult<()> {
        self.frames = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let failed_at = self.frames_read + 1;
        let status = child.wait().map_err(|e| MediaError::DecodeFailed {
            frame: failed_at,
            message: format!("{}: failed to wait for FFmpeg: {e}", self.path.display()),
        })?;
        if status.success() {
            debug!(
                path = %self.path.display(),
                frames_read = self.frames_read,
                "FFmpeg decoder finished"
            );
            return Ok(());
        }

        let stderr = self.read_stderr();
        Err(MediaError::DecodeFailed {
            frame: failed_at,
            message: format!(
                "{}: FFmpeg exited with {}: {}",
                self.path.display(),
                status,
                stderr.trim()
            ),
        })
    }

    fn read_stderr(&mut self) -> String {
        let mut out = String::new();
        if let Some(file) = self.stderr.as_mut() {
            if file.seek(SeekFrom::Start(0)).is_ok() {
                let _ = file.read_to_string(&mut out);
            }
        }
        out
    }
}

impl FrameSource for FfmpegFrameSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };

        let next = frames.read_frame();
        self.frames_read = frames.frames_read();

        match next {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.finish()?;
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            // Killing an already exited child is harmless; waiting reaps it.
            let _ = child.kill();
            let _ = child.wait();
            debug!(
                path = %self.path.display(),
                frames_read = self.frames_read,
                "Closed FFmpeg decoder"
            );
        }
        self.stderr = None;
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
