//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vmotion_models::analysis::{
    DEFAULT_FRAME_SKIP, DEFAULT_HISTORY_LENGTH, DEFAULT_MOTION_THRESHOLD,
    DEFAULT_VARIANCE_THRESHOLD, DEFAULT_VIDEO_SCORE_THRESHOLD,
};
use vmotion_models::{AnalysisConfig, ShadowPolicy};

use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent analyses
    pub max_concurrent_jobs: usize,
    /// Per-analysis timeout
    pub job_timeout: Duration,
    /// Staging directory for uploaded videos
    pub work_dir: PathBuf,
    /// Largest accepted upload
    pub max_upload_bytes: u64,
    /// Prometheus text file written on exit
    pub metrics_file: Option<PathBuf>,
    /// Pipeline parameters applied to every job
    pub analysis: AnalysisConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(600), // 10 minutes
            work_dir: default_work_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            metrics_file: None,
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("video_uploads")
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            max_concurrent_jobs: lookup("WORKER_MAX_JOBS")
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(2),
            job_timeout: Duration::from_secs(
                lookup("WORKER_JOB_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            work_dir: lookup("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_work_dir),
            max_upload_bytes: lookup("WORKER_MAX_UPLOAD_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            metrics_file: lookup("METRICS_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            analysis: analysis_from_lookup(&lookup),
        }
    }
}

/// Read the analysis parameters (`MOTION_*` variables).
pub fn analysis_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnalysisConfig {
    AnalysisConfig {
        frame_skip_base: lookup("MOTION_FRAME_SKIP")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FRAME_SKIP),
        motion_threshold: lookup("MOTION_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MOTION_THRESHOLD),
        history_length: lookup("MOTION_HISTORY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HISTORY_LENGTH),
        variance_threshold: lookup("MOTION_VAR_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_VARIANCE_THRESHOLD),
        shadow_detection: lookup("MOTION_DETECT_SHADOWS")
            .and_then(|s| parse_bool(&s))
            .unwrap_or(true),
        video_score_threshold: lookup("MOTION_VIDEO_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_VIDEO_SCORE_THRESHOLD),
        shadow_policy: lookup("MOTION_SHADOW_POLICY")
            .and_then(|s| ShadowPolicy::parse(&s))
            .unwrap_or_default(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
