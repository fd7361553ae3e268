//! Job executor.
//!
//! Each input becomes one job: validate, stage into the work directory,
//! analyze on a blocking thread, then complete or fail its [`VideoRecord`].
//! Jobs run concurrently up to `max_concurrent_jobs`, and each one builds
//! its own analysis pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, Instrument};

use vmotion_media::analyze_video_with_timing;
use vmotion_models::{AnalysisResult, VideoRecord, VideoStatus};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::upload::{stage_file, validate_upload};

const OPERATION: &str = "motion_analysis";

/// Final state of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Input as given by the caller
    pub input: PathBuf,
    pub record: VideoRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.record.status == VideoStatus::Completed
    }
}

/// Runs motion analysis jobs with bounded concurrency.
pub struct JobExecutor {
    config: Arc<WorkerConfig>,
    job_semaphore: Arc<Semaphore>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            job_semaphore,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Analyze every input. Outcomes are returned in input order.
    pub async fn run(&self, inputs: Vec<PathBuf>) -> Vec<JobOutcome> {
        info!(
            jobs = inputs.len(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let config = Arc::clone(&self.config);
                let semaphore = Arc::clone(&self.job_semaphore);
                let record = VideoRecord::new(display_name(&input));
                let fallback = (input.clone(), record.clone());
                let handle = tokio::spawn(Self::execute_job(config, semaphore, input, record));
                (fallback, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((input, record), handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = WorkerError::job_failed(format!("job task aborted: {e}"));
                    metrics::record_analysis_failed(&error);
                    JobOutcome {
                        input,
                        record: record.fail(error.to_string()),
                        result: None,
                        finished_at: Utc::now(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(total = outcomes.len(), failed, "Job executor finished");
        outcomes
    }

    /// Analyze a single input.
    pub async fn run_one(&self, input: PathBuf) -> JobOutcome {
        let record = VideoRecord::new(display_name(&input));
        Self::execute_job(
            Arc::clone(&self.config),
            Arc::clone(&self.job_semaphore),
            input,
            record,
        )
        .await
    }

    async fn execute_job(
        config: Arc<WorkerConfig>,
        semaphore: Arc<Semaphore>,
        input: PathBuf,
        record: VideoRecord,
    ) -> JobOutcome {
        let logger = JobLogger::new(&record.id, OPERATION);
        let span = logger.create_span();

        async move {
            metrics::record_analysis_started();

            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    logger.log_start(&record.filename);
                    Self::analyze(&config, &input, &logger).await
                }
                Err(_) => Err(WorkerError::job_failed("executor is shutting down")),
            };

            let (record, result) = match outcome {
                Ok(result) => {
                    metrics::record_analysis_completed(&result);
                    logger.log_analysis(&result);
                    (record.complete(&result), Some(result))
                }
                Err(e) => {
                    metrics::record_analysis_failed(&e);
                    logger.log_failure(&e);
                    (record.fail(e.to_string()), None)
                }
            };

            JobOutcome {
                input,
                record,
                result,
                finished_at: Utc::now(),
            }
        }
        .instrument(span)
        .await
    }

    async fn analyze(
        config: &WorkerConfig,
        input: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        validate_upload(&display_name(input), None)?;

        let input = input.to_path_buf();
        let work_dir = config.work_dir.clone();
        let max_bytes = config.max_upload_bytes;
        let analysis = config.analysis.clone();
        let job_logger = logger.clone();

        // Staging and decoding are blocking work. The staged copy is removed
        // once analysis ends, or on drop if the task is torn down first.
        let task = tokio::task::spawn_blocking(move || -> WorkerResult<AnalysisResult> {
            let staged = stage_file(&input, &work_dir, max_bytes)?;
            job_logger.log_staged(staged.filename(), staged.size());

            let result = analyze_video_with_timing(staged.path(), &analysis);

            if let Err(e) = staged.remove() {
                job_logger.log_warning(&format!("failed to remove staged input: {e}"));
            }
            Ok(result?)
        });

        match tokio::time::timeout(config.job_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(WorkerError::job_failed(format!("analysis task failed: {e}"))),
            Err(_) => Err(WorkerError::Timeout(config.job_timeout)),
        }
    }
}

fn display_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}
