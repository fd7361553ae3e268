//! Structured logging setup and job-scoped log events.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmotion_models::{AnalysisResult, VideoId};

use crate::error::WorkerError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "vmotion=info";

/// Initialize tracing: human-readable by default, JSON when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    // Logs go to stderr; stdout carries the JSON records.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Job-scoped motion analysis events.
///
/// Every event carries the video ID and operation name; outcome events add
/// the analysis figures as structured fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    video_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(video_id: &VideoId, operation: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, filename: &str) {
        info!(
            video_id = %self.video_id,
            operation = %self.operation,
            filename,
            "Job started"
        );
    }

    /// The input was copied into the work directory.
    pub fn log_staged(&self, filename: &str, bytes: u64) {
        info!(
            video_id = %self.video_id,
            operation = %self.operation,
            filename,
            bytes,
            "Input staged"
        );
    }

    pub fn log_analysis(&self, result: &AnalysisResult) {
        info!(
            video_id = %self.video_id,
            operation = %self.operation,
            has_motion = result.has_motion,
            motion_score = result.motion_score,
            frames_analyzed = result.frames_analyzed,
            total_frames = result.total_frames,
            processing_time = result.processing_time,
            "Motion analysis completed"
        );
    }

    /// Rejected uploads log at warn, everything else at error.
    pub fn log_failure(&self, err: &WorkerError) {
        let kind = err.kind();
        let processing_time = err.processing_time();
        if err.is_client_error() {
            warn!(
                video_id = %self.video_id,
                operation = %self.operation,
                kind,
                "Job rejected: {}", err
            );
        } else {
            error!(
                video_id = %self.video_id,
                operation = %self.operation,
                kind,
                processing_time,
                "Job failed: {}", err
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            video_id = %self.video_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span that groups every event of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            video_id = %self.video_id,
            operation = %self.operation
        )
    }
}
