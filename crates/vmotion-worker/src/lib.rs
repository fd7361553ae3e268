//! Video motion analysis worker.
//!
//! This crate provides:
//! - Environment configuration for the worker and the analysis pipeline
//! - Upload validation and temporary staging
//! - A job executor running analyses concurrently under a per-job timeout
//! - Structured job logging
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod upload;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobOutcome};
pub use logging::{init_tracing, JobLogger};
pub use upload::{stage_file, validate_upload, StagedUpload};
