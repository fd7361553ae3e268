//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analysis::AnalysisResult;

/// Unique identifier for an analyzed video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Analysis status of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Analysis is running
    #[default]
    Processing,
    /// Analysis finished and a result is attached
    Completed,
    /// Analysis failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    /// Returns true once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video record handed to the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique video ID
    pub id: VideoId,

    /// Original upload filename
    pub filename: String,

    /// Motion verdict (false until completed)
    pub has_motion: bool,

    /// Motion score, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_score: Option<f64>,

    /// Processing time in seconds, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,

    /// Current status
    #[serde(default)]
    pub status: VideoStatus,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a new record in the processing state.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            id: VideoId::new(),
            filename: filename.into(),
            has_motion: false,
            motion_score: None,
            processing_time: None,
            status: VideoStatus::Processing,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Mark as completed with the analysis result.
    pub fn complete(mut self, result: &AnalysisResult) -> Self {
        self.has_motion = result.has_motion;
        self.motion_score = Some(result.motion_score);
        self.processing_time = Some(result.processing_time);
        self.status = VideoStatus::Completed;
        self
    }

    /// Mark as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = VideoStatus::Failed;
        self.error_message = Some(error.into());
        self
    }
}
