//! Shared data models for the video motion analysis service.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis configuration (sampling, background model, thresholds)
//! - Per-video analysis results
//! - Video records handed to the persistence layer

pub mod analysis;
pub mod video;

// Re-export common types
pub use analysis::{AnalysisConfig, AnalysisResult, ShadowPolicy};
pub use video::{VideoId, VideoRecord, VideoStatus};
