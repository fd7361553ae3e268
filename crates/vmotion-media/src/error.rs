//! Error types for motion analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding or analyzing a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Video file not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot open video file: {0}")]
    Unreadable(String),

    #[error("Video decode failed at frame {frame}: {message}")]
    DecodeFailed { frame: u64, message: String },

    #[error("Video file is empty")]
    EmptyVideo,

    #[error("Invalid video FPS: {0}")]
    InvalidFrameRate(f64),

    #[error("Error during video analysis: {0}")]
    AnalysisError(String),

    #[error("Invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an unreadable-stream error.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::Unreadable(message.into())
    }

    /// Create an analysis failure error.
    pub fn analysis(message: impl Into<String>) -> Self {
        Self::AnalysisError(message.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Classify this error into the failure taxonomy reported to callers.
    ///
    /// Decoder tooling and probe failures mean the stream could not be opened,
    /// so they report as `Unreadable`.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Unreadable(_)
            | Self::DecodeFailed { .. }
            | Self::FfmpegNotFound
            | Self::FfprobeNotFound
            | Self::FfprobeFailed { .. }
            | Self::JsonParse(_) => FailureKind::Unreadable,
            Self::EmptyVideo => FailureKind::EmptyVideo,
            Self::InvalidFrameRate(_) => FailureKind::InvalidFrameRate,
            Self::AnalysisError(_) | Self::InvalidConfig(_) | Self::Io(_) => {
                FailureKind::AnalysisError
            }
        }
    }
}

/// Failure categories surfaced by an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NotFound,
    Unreadable,
    EmptyVideo,
    InvalidFrameRate,
    AnalysisError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unreadable => "unreadable",
            Self::EmptyVideo => "empty_video",
            Self::InvalidFrameRate => "invalid_frame_rate",
            Self::AnalysisError => "analysis_error",
        }
    }
}

/// A failed analysis, normalized with the elapsed processing time.
#[derive(Debug, Error)]
#[error("{source} (processing time: {processing_time:.2}s)")]
pub struct AnalysisFailure {
    /// The underlying failure
    pub source: MediaError,
    /// Seconds elapsed before the failure, rounded to 2 decimals
    pub processing_time: f64,
}

impl AnalysisFailure {
    pub fn new(source: MediaError, processing_time: f64) -> Self {
        Self {
            source,
            processing_time,
        }
    }

    /// Failure category of the underlying error.
    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }
}
