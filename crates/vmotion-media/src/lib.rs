//! Motion detection pipeline for uploaded video files.
//!
//! This crate provides:
//! - Frame sources over decoded video (FFmpeg CLI, optional OpenCV, in-memory)
//! - FFprobe metadata probing
//! - Adaptive frame sampling for long videos
//! - An adaptive per-pixel Gaussian-mixture background model with shadow detection
//! - Aggregation of per-frame foreground ratios into a video-level motion score
//! - A timed analysis entry point that always releases the decoder

pub mod aggregator;
pub mod analyzer;
pub mod error;
pub mod probe;
pub mod sampler;
pub mod segmenter;
pub mod source;

pub use aggregator::{MotionAggregator, MotionScore};
pub use analyzer::{analyze_video, analyze_video_with_timing, timed, MotionAnalyzer, MotionSummary};
pub use error::{AnalysisFailure, FailureKind, MediaError, MediaResult};
pub use probe::{probe_video, probe_video_with, VideoInfo};
pub use sampler::FrameSampler;
pub use segmenter::{BackgroundSubtractor, ForegroundMask, MaskCell, Mog2Config, Mog2Segmenter};
pub use source::{
    open_video, FfmpegFrameSource, FfmpegTools, Frame, FrameSource, MemoryFrameSource, RawFrameReader,
    StreamInfo,
};

#[cfg(feature = "opencv")]
pub use source::OpencvFrameSource;

// Re-export shared models used in this crate's API
pub use vmotion_models::{AnalysisConfig, AnalysisResult, ShadowPolicy};
