//! Prometheus metrics for video analysis.

use std::path::Path;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use vmotion_models::AnalysisResult;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const VIDEO_ANALYSIS_TOTAL: &str = "video_analysis_total";
    pub const VIDEO_ANALYSIS_ERRORS_TOTAL: &str = "video_analysis_errors_total";
    pub const VIDEO_ANALYSIS_MOTION_DETECTED_TOTAL: &str = "video_analysis_motion_detected_total";
    pub const VIDEO_ANALYSIS_PROCESSING_TIME_SECONDS: &str =
        "video_analysis_processing_time_seconds";
}

/// Histogram buckets for processing time, in seconds.
pub const PROCESSING_TIME_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

fn builder() -> WorkerResult<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::VIDEO_ANALYSIS_PROCESSING_TIME_SECONDS.to_string()),
            PROCESSING_TIME_BUCKETS,
        )
        .map_err(|e| WorkerError::Metrics(e.to_string()))
}

/// Install the global Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> WorkerResult<PrometheusHandle> {
    builder()?
        .install_recorder()
        .map_err(|e| WorkerError::Metrics(e.to_string()))
}

/// Write the current exposition text to `path` (textfile collector format).
pub fn write_metrics(handle: &PrometheusHandle, path: &Path) -> WorkerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, handle.render())?;
    Ok(())
}

/// Record an analysis request.
pub fn record_analysis_started() {
    counter!(names::VIDEO_ANALYSIS_TOTAL).increment(1);
}

/// Record a successful analysis.
pub fn record_analysis_completed(result: &AnalysisResult) {
    histogram!(names::VIDEO_ANALYSIS_PROCESSING_TIME_SECONDS).record(result.processing_time);
    if result.has_motion {
        counter!(names::VIDEO_ANALYSIS_MOTION_DETECTED_TOTAL).increment(1);
    }
}

/// Record a failed analysis.
pub fn record_analysis_failed(error: &WorkerError) {
    let labels = [("kind", error.kind().to_string())];
    counter!(names::VIDEO_ANALYSIS_ERRORS_TOTAL, &labels).increment(1);
    if let Some(elapsed) = error.processing_time() {
        histogram!(names::VIDEO_ANALYSIS_PROCESSING_TIME_SECONDS).record(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmotion_media::{AnalysisFailure, MediaError};

    fn result(has_motion: bool, processing_time: f64) -> AnalysisResult {
        AnalysisResult {
            has_motion,
            motion_score: if has_motion { 12.5 } else { 0.0 },
            frames_analyzed: 40,
            total_frames: 400,
            processing_time,
        }
    }

    #[test]
    fn test_recorded_metrics_render() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_analysis_started();
            record_analysis_started();
            record_analysis_started();
            record_analysis_completed(&result(true, 0.4));
            record_analysis_completed(&result(false, 3.0));
            record_analysis_failed(&AnalysisFailure::new(MediaError::EmptyVideo, 0.01).into());
        });

        let text = handle.render();
        assert!(text.contains("video_analysis_total 3"));
        assert!(text.contains("video_analysis_motion_detected_total 1"));
        assert!(text.contains("video_analysis_errors_total{kind=\"empty_video\"} 1"));
        assert!(text.contains("video_analysis_processing_time_seconds_bucket{le=\"0.5\"} 2"));
        assert!(text.contains("video_analysis_processing_time_seconds_count 3"));
    }

    #[test]
    fn test_write_metrics_file() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record_analysis_started);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("textfile").join("vmotion.prom");
        write_metrics(&handle, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("video_analysis_total 1"));
    }
}
