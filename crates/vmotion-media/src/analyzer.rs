//! Video motion analysis.
//!
//! Runs the full pipeline for one video:
//! open stream → validate → sample → segment → aggregate → close.
//!
//! Every analysis builds its own sampler, background model and aggregator,
//! so concurrent analyses never share state. The frame source is closed on
//! every exit path.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, info_span, trace, warn};

use vmotion_models::{AnalysisConfig, AnalysisResult};

use crate::aggregator::{round2, MotionAggregator};
use crate::error::{AnalysisFailure, MediaError, MediaResult};
use crate::sampler::FrameSampler;
use crate::segmenter::{BackgroundSubtractor, Mog2Segmenter};
use crate::source::{open_video, FrameSource};

/// Outcome of an untimed analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSummary {
    pub has_motion: bool,
    /// Percentage of analyzed frames with motion, 2 decimals
    pub motion_score: f64,
    pub frames_analyzed: u64,
    pub frames_with_motion: u64,
    /// Frame count reported by the stream
    pub total_frames: u64,
}

impl MotionSummary {
    /// Attach the elapsed processing time.
    pub fn into_result(self, processing_time: f64) -> AnalysisResult {
        AnalysisResult {
            has_motion: self.has_motion,
            motion_score: self.motion_score,
            frames_analyzed: self.frames_analyzed,
            total_frames: self.total_frames,
            processing_time,
        }
    }
}

/// Motion analyzer for a fixed configuration.
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    config: AnalysisConfig,
}

impl MotionAnalyzer {
    /// Create an analyzer, rejecting configurations the pipeline cannot run.
    pub fn new(config: AnalysisConfig) -> MediaResult<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Open `path` with the compiled-in decoder and analyze it.
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> MediaResult<MotionSummary> {
        let path = path.as_ref();
        let mut source = open_video(path)?;
        debug!(path = %path.display(), "Video opened for analysis");
        self.analyze_source(&mut source)
    }

    /// Analyze an already opened source. The source is closed before returning.
    pub fn analyze_source<S>(&self, source: &mut S) -> MediaResult<MotionSummary>
    where
        S: FrameSource + ?Sized,
    {
        let result = self.run(source);
        source.close();
        result
    }

    fn run<S>(&self, source: &mut S) -> MediaResult<MotionSummary>
    where
        S: FrameSource + ?Sized,
    {
        let info = *source.info();

        if info.total_frames == 0 {
            return Err(MediaError::EmptyVideo);
        }
        if !info.fps.is_finite() || info.fps <= 0.0 {
            return Err(MediaError::InvalidFrameRate(info.fps));
        }

        let sampler = FrameSampler::new(info.total_frames, self.config.frame_skip_base);
        let mut segmenter = Mog2Segmenter::from_analysis(&self.config);
        let mut aggregator = MotionAggregator::from_analysis(&self.config);

        let span = info_span!(
            "motion_analysis",
            total_frames = info.total_frames,
            fps = info.fps,
            width = info.width,
            height = info.height,
            base_skip = sampler.base_skip(),
            frame_skip = sampler.effective_skip()
        );
        let _enter = span.enter();

        debug!(
            expected_frames = sampler.expected_selected(info.total_frames),
            "Starting motion analysis"
        );

        let mut frame_number = 0u64;
        while frame_number < info.total_frames {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e @ MediaError::DecodeFailed { .. }) => return Err(e),
                Err(e) => {
                    return Err(MediaError::DecodeFailed {
                        frame: frame_number + 1,
                        message: e.to_string(),
                    })
                }
            };
            frame_number += 1;

            if !sampler.should_analyze(frame_number) {
                continue;
            }

            let mask = segmenter.classify(&frame);
            if (mask.width(), mask.height()) != frame.dimensions() {
                return Err(MediaError::analysis(format!(
                    "mask {}x{} does not match frame {}x{} at frame {}",
                    mask.width(),
                    mask.height(),
                    frame.width(),
                    frame.height(),
                    frame_number
                )));
            }

            let is_motion = aggregator.accumulate(&mask);
            trace!(
                frame_number,
                is_motion,
                foreground = mask.foreground_count(),
                shadow = mask.shadow_count(),
                "Frame classified"
            );
        }

        if frame_number < info.total_frames {
            warn!(
                frames_read = frame_number,
                total_frames = info.total_frames,
                "Stream ended before reported frame count"
            );
        }

        let score = aggregator.score();
        info!(
            frames_analyzed = score.frames_analyzed,
            frames_with_motion = score.frames_with_motion,
            model_frames = segmenter.frames_seen(),
            motion_score = score.motion_score,
            has_motion = score.has_motion,
            "Motion analysis finished"
        );

        Ok(MotionSummary {
            has_motion: score.has_motion,
            motion_score: score.motion_score,
            frames_analyzed: score.frames_analyzed,
            frames_with_motion: score.frames_with_motion,
            total_frames: info.total_frames,
        })
    }
}

fn validate_config(config: &AnalysisConfig) -> MediaResult<()> {
    if config.frame_skip_base == 0 {
        return Err(MediaError::invalid_config("frame_skip_base must be at least 1"));
    }
    if config.history_length == 0 {
        return Err(MediaError::invalid_config("history_length must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.motion_threshold) {
        return Err(MediaError::invalid_config(format!(
            "motion_threshold must be within [0, 1], got {}",
            config.motion_threshold
        )));
    }
    if !config.variance_threshold.is_finite() || config.variance_threshold <= 0.0 {
        return Err(MediaError::invalid_config(format!(
            "variance_threshold must be positive, got {}",
            config.variance_threshold
        )));
    }
    if !config.video_score_threshold.is_finite() || config.video_score_threshold < 0.0 {
        return Err(MediaError::invalid_config(format!(
            "video_score_threshold must be non-negative, got {}",
            config.video_score_threshold
        )));
    }
    Ok(())
}

/// Analyze a video file without timing.
pub fn analyze_video(path: impl AsRef<Path>, config: &AnalysisConfig) -> MediaResult<MotionSummary> {
    MotionAnalyzer::new(config.clone())?.analyze_path(path)
}

/// Analyze a video file and attach the elapsed processing time.
///
/// Failures keep their kind and report the time spent before failing.
pub fn analyze_video_with_timing(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisFailure> {
    let path = path.as_ref();
    timed(|| analyze_video(path, config)).map(|(summary, elapsed)| summary.into_result(elapsed))
}

/// Run `f`, measuring wall-clock seconds (2 decimals) on both outcomes.
pub fn timed<T>(f: impl FnOnce() -> MediaResult<T>) -> Result<(T, f64), AnalysisFailure> {
    let start = Instant::now();
    let outcome = f();
    let elapsed = round2(start.elapsed().as_secs_f64());

    match outcome {
        Ok(value) => Ok((value, elapsed)),
        Err(e) => Err(AnalysisFailure::new(e, elapsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::source::{Frame, MemoryFrameSource, StreamInfo};
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use vmotion_models::ShadowPolicy;

    const GRAY: Rgb<u8> = Rgb([100, 100, 100]);

    fn static_frames(count: usize, width: u32, height: u32) -> Vec<Frame> {
        (0..count)
            .map(|_| RgbImage::from_pixel(width, height, GRAY))
            .collect()
    }

    fn paint(frame: &mut Frame, x0: u32, width: u32, color: Rgb<u8>) {
        for y in 0..frame.height() {
            for x in x0..(x0 + width).min(frame.width()) {
                frame.put_pixel(x, y, color);
            }
        }
    }

    fn analyzer() -> MotionAnalyzer {
        MotionAnalyzer::new(AnalysisConfig::default()).unwrap()
    }

    /// Fails on the given 1-based frame.
    struct FailingSource {
        info: StreamInfo,
        fail_at: u64,
        served: u64,
        closed: Arc<AtomicBool>,
        error: fn(u64) -> MediaError,
    }

    fn io_error(_frame: u64) -> MediaError {
        MediaError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "corrupt packet",
        ))
    }

    impl FrameSource for FailingSource {
        fn info(&self) -> &StreamInfo {
            &self.info
        }

        fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
            self.served += 1;
            if self.served == self.fail_at {
                return Err((self.error)(self.served));
            }
            Ok(Some(RgbImage::from_pixel(4, 4, GRAY)))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_static_video_has_no_motion() {
        let mut source = MemoryFrameSource::from_frames(static_frames(100, 16, 12), 30.0);
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.total_frames, 100);
        assert_eq!(summary.frames_analyzed, 10);
        assert_eq!(summary.motion_score, 0.0);
        assert!(!summary.has_motion);
        assert!(source.is_closed());
    }

    #[test]
    fn test_long_video_uses_wider_skip() {
        let mut source = MemoryFrameSource::from_frames(static_frames(1200, 4, 4), 30.0);
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.frames_analyzed, 60);
        assert_eq!(summary.total_frames, 1200);
    }

    #[test]
    fn test_moving_object_is_detected() {
        // A block appears at a fresh position on every sampled frame after the first.
        let frames = (0..100u32)
            .map(|i| {
                let mut frame = RgbImage::from_pixel(80, 10, GRAY);
                let sample = (i + 1) / 10;
                paint(&mut frame, sample * 7, 6, Rgb([250, 20, 20]));
                frame
            })
            .collect();
        let mut source = MemoryFrameSource::from_frames(frames, 25.0);
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.frames_analyzed, 10);
        assert_eq!(summary.frames_with_motion, 9);
        assert_eq!(summary.motion_score, 90.0);
        assert!(summary.has_motion);
    }

    fn shadow_frames() -> Vec<Frame> {
        let bg = Rgb([200, 150, 100]);
        let dark = Rgb([120, 90, 60]);
        (0..100u32)
            .map(|i| {
                let mut frame = RgbImage::from_pixel(60, 5, bg);
                let sample = (i + 1) / 10;
                if sample >= 2 {
                    paint(&mut frame, (sample - 1) * 6, 5, dark);
                }
                frame
            })
            .collect()
    }

    #[test]
    fn test_moving_shadow_policy() {
        let mut source = MemoryFrameSource::from_frames(shadow_frames(), 30.0);
        let excluded = analyzer().analyze_source(&mut source).unwrap();
        assert_eq!(excluded.motion_score, 0.0);
        assert!(!excluded.has_motion);

        let include = AnalysisConfig::default().with_shadow_policy(ShadowPolicy::Include);
        let mut source = MemoryFrameSource::from_frames(shadow_frames(), 30.0);
        let included = MotionAnalyzer::new(include)
            .unwrap()
            .analyze_source(&mut source)
            .unwrap();
        assert_eq!(included.motion_score, 90.0);
        assert!(included.has_motion);
    }

    #[test]
    fn test_empty_stream_fails_and_closes() {
        let mut source = MemoryFrameSource::from_frames(Vec::new(), 30.0);
        let closed = source.close_flag();

        let err = analyzer().analyze_source(&mut source).unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyVideo);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invalid_frame_rate() {
        for fps in [0.0, -5.0, f64::NAN] {
            let mut source = MemoryFrameSource::from_frames(static_frames(20, 4, 4), fps);
            let err = analyzer().analyze_source(&mut source).unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidFrameRate);
            assert!(source.is_closed());
        }
    }

    #[test]
    fn test_too_few_frames_scores_zero() {
        let mut source = MemoryFrameSource::from_frames(static_frames(5, 4, 4), 30.0);
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.frames_analyzed, 0);
        assert_eq!(summary.motion_score, 0.0);
        assert!(!summary.has_motion);
    }

    #[test]
    fn test_reading_stops_at_reported_frame_count() {
        let info = StreamInfo {
            total_frames: 50,
            fps: 30.0,
            width: 4,
            height: 4,
        };
        let mut source = MemoryFrameSource::new(info, static_frames(80, 4, 4));
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.frames_analyzed, 5);
        assert!(summary.frames_analyzed <= summary.total_frames);
    }

    #[test]
    fn test_short_stream_scores_frames_read() {
        let info = StreamInfo {
            total_frames: 100,
            fps: 30.0,
            width: 4,
            height: 4,
        };
        let mut source = MemoryFrameSource::new(info, static_frames(35, 4, 4));
        let summary = analyzer().analyze_source(&mut source).unwrap();

        assert_eq!(summary.frames_analyzed, 3);
        assert_eq!(summary.total_frames, 100);
    }

    #[test]
    fn test_decode_failure_is_unreadable_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut source = FailingSource {
            info: StreamInfo {
                total_frames: 40,
                fps: 30.0,
                width: 4,
                height: 4,
            },
            fail_at: 23,
            served: 0,
            closed: Arc::clone(&closed),
            error: io_error,
        };

        let err = analyzer().analyze_source(&mut source).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unreadable);
        assert!(err.to_string().contains("frame 23"));
        assert!(err.to_string().contains("corrupt packet"));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_decode_failure_from_source_is_not_rewrapped() {
        let mut source = FailingSource {
            info: StreamInfo {
                total_frames: 40,
                fps: 30.0,
                width: 4,
                height: 4,
            },
            fail_at: 7,
            served: 0,
            closed: Arc::new(AtomicBool::new(false)),
            error: |frame| MediaError::DecodeFailed {
                frame,
                message: "FFmpeg exited with exit status: 1".to_string(),
            },
        };

        let err = analyzer().analyze_source(&mut source).unwrap_err();
        let message = err.to_string();

        assert_eq!(err.kind(), FailureKind::Unreadable);
        assert_eq!(message, "Video decode failed at frame 7: FFmpeg exited with exit status: 1");
        assert_eq!(message.matches("decode failed").count(), 1);
        assert!(!message.contains("Cannot open video file"));
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let make = || {
            (0..60u32)
                .map(|i| {
                    let mut frame = RgbImage::from_pixel(30, 6, GRAY);
                    paint(&mut frame, (i * 3) % 24, 4, Rgb([0, 0, 250]));
                    frame
                })
                .collect::<Vec<_>>()
        };

        let first = analyzer()
            .analyze_source(&mut MemoryFrameSource::from_frames(make(), 30.0))
            .unwrap();
        let second = analyzer()
            .analyze_source(&mut MemoryFrameSource::from_frames(make(), 30.0))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = [
            AnalysisConfig::default().with_frame_skip(0),
            AnalysisConfig::default().with_motion_threshold(1.5),
            AnalysisConfig {
                history_length: 0,
                ..Default::default()
            },
            AnalysisConfig {
                variance_threshold: 0.0,
                ..Default::default()
            },
            AnalysisConfig {
                video_score_threshold: -1.0,
                ..Default::default()
            },
        ];

        for config in bad {
            let err = MotionAnalyzer::new(config).unwrap_err();
            assert!(matches!(err, MediaError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_timed_missing_file() {
        let failure =
            analyze_video_with_timing("/no/such/clip.mp4", &AnalysisConfig::default()).unwrap_err();

        assert_eq!(failure.kind(), FailureKind::NotFound);
        assert!(failure.processing_time >= 0.0);
        let message = failure.to_string();
        assert!(message.starts_with("Video file not found: /no/such/clip.mp4"));
        assert!(message.contains("(processing time: "));
    }

    #[test]
    fn test_timed_success_attaches_time() {
        let (value, elapsed) = timed(|| Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert!(elapsed >= 0.0);

        let summary = MotionSummary {
            has_motion: true,
            motion_score: 4.0,
            frames_analyzed: 50,
            frames_with_motion: 2,
            total_frames: 500,
        };
        let result = summary.into_result(1.25);
        assert_eq!(result.processing_time, 1.25);
        assert_eq!(result.frames_analyzed, 50);
        assert!(result.has_motion);
    }
}
