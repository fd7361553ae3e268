//! Worker error types.

use std::time::Duration;

use thiserror::Error;

use vmotion_media::{AnalysisFailure, FailureKind};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// `size` is the number of bytes read before giving up.
    #[error("File too large: exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Error processing video: {0}")]
    Analysis(#[from] AnalysisFailure),

    #[error("Analysis timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_upload(msg: impl Into<String>) -> Self {
        Self::InvalidUpload(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Check if the request itself was at fault (a 400, not a 500).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidUpload(_)
                | WorkerError::UnsupportedFormat(_)
                | WorkerError::FileTooLarge { .. }
                | WorkerError::InputNotFound(_)
        )
    }

    /// Metric label for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InvalidUpload(_)
            | WorkerError::UnsupportedFormat(_)
            | WorkerError::FileTooLarge { .. }
            | WorkerError::InputNotFound(_) => "invalid_upload",
            WorkerError::Analysis(failure) => failure.kind().as_str(),
            WorkerError::Timeout(_) => "timeout",
            WorkerError::JobFailed(_) | WorkerError::Metrics(_) | WorkerError::Io(_) => "internal",
        }
    }

    /// Failure category from the analysis pipeline, if it got that far.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            WorkerError::Analysis(failure) => Some(failure.kind()),
            _ => None,
        }
    }

    /// Seconds spent in the pipeline before failing, if known.
    pub fn processing_time(&self) -> Option<f64> {
        match self {
            WorkerError::Analysis(failure) => Some(failure.processing_time),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmotion_media::MediaError;

    #[test]
    fn test_client_errors() {
        assert!(WorkerError::invalid_upload("no filename").is_client_error());
        assert!(WorkerError::UnsupportedFormat(".txt".into()).is_client_error());
        assert!(WorkerError::FileTooLarge { size: 10, max: 5 }.is_client_error());
        assert!(!WorkerError::Timeout(Duration::from_secs(5)).is_client_error());
        assert!(!WorkerError::job_failed("panic").is_client_error());
    }

    #[test]
    fn test_analysis_failure_keeps_kind_and_time() {
        let err: WorkerError = AnalysisFailure::new(MediaError::EmptyVideo, 0.25).into();

        assert!(!err.is_client_error());
        assert_eq!(err.kind(), "empty_video");
        assert_eq!(err.failure_kind(), Some(FailureKind::EmptyVideo));
        assert_eq!(err.processing_time(), Some(0.25));
        assert_eq!(
            err.to_string(),
            "Error processing video: Video file is empty (processing time: 0.25s)"
        );
    }

    #[test]
    fn test_internal_errors_share_a_label() {
        assert_eq!(WorkerError::job_failed("panic").kind(), "internal");
        assert_eq!(WorkerError::Metrics("bind failed".into()).kind(), "internal");
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(WorkerError::from(io).kind(), "internal");
    }

    #[test]
    fn test_timeout_message() {
        let err = WorkerError::Timeout(Duration::from_secs(600));
        assert_eq!(err.to_string(), "Analysis timed out after 600s");
        assert_eq!(err.kind(), "timeout");
    }
}
