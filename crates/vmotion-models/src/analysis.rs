//! Motion analysis configuration and result models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default base frame skip interval (analyze every Nth frame).
pub const DEFAULT_FRAME_SKIP: u32 = 10;
/// Default fraction of pixels that must move for a frame to count as a motion frame.
pub const DEFAULT_MOTION_THRESHOLD: f64 = 0.01;
/// Default number of frames contributing to the background estimate.
pub const DEFAULT_HISTORY_LENGTH: u32 = 500;
/// Default squared Mahalanobis distance separating foreground from background.
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 50.0;
/// Default percentage of motion frames above which a video has motion.
pub const DEFAULT_VIDEO_SCORE_THRESHOLD: f64 = 1.0;

/// Whether shadow pixels count towards a frame's motion ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShadowPolicy {
    /// Only true foreground pixels are motion; shadows are ignored.
    #[default]
    Exclude,
    /// Shadow pixels are counted as motion alongside foreground pixels.
    Include,
}

impl ShadowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclude => "exclude",
            Self::Include => "include",
        }
    }

    /// Parse from a config string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Some(Self::Exclude),
            "include" => Some(Self::Include),
            _ => None,
        }
    }

    /// Returns true if shadow pixels count as motion.
    pub fn counts_shadows(&self) -> bool {
        matches!(self, Self::Include)
    }
}

/// Pipeline construction parameters for one analysis.
///
/// All fields have defaults, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Base skip interval; long videos raise it to at least 20
    pub frame_skip_base: u32,
    /// Per-frame motion ratio threshold (0.0-1.0)
    pub motion_threshold: f64,
    /// Background model history length in frames
    pub history_length: u32,
    /// Foreground distance threshold for the background model
    pub variance_threshold: f64,
    /// Classify shadows as a separate category
    pub shadow_detection: bool,
    /// Video-level threshold on the motion score (percent)
    pub video_score_threshold: f64,
    /// Whether shadows count as motion
    pub shadow_policy: ShadowPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_skip_base: DEFAULT_FRAME_SKIP,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            history_length: DEFAULT_HISTORY_LENGTH,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            shadow_detection: true,
            video_score_threshold: DEFAULT_VIDEO_SCORE_THRESHOLD,
            shadow_policy: ShadowPolicy::Exclude,
        }
    }
}

impl AnalysisConfig {
    /// Set the base frame skip interval.
    pub fn with_frame_skip(mut self, frame_skip_base: u32) -> Self {
        self.frame_skip_base = frame_skip_base;
        self
    }

    /// Set the per-frame motion threshold.
    pub fn with_motion_threshold(mut self, motion_threshold: f64) -> Self {
        self.motion_threshold = motion_threshold;
        self
    }

    /// Set the shadow counting policy.
    pub fn with_shadow_policy(mut self, shadow_policy: ShadowPolicy) -> Self {
        self.shadow_policy = shadow_policy;
        self
    }

    /// Enable or disable shadow classification.
    pub fn with_shadow_detection(mut self, enabled: bool) -> Self {
        self.shadow_detection = enabled;
        self
    }
}

/// Outcome of analyzing one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Whether the motion score exceeds the video-level threshold
    pub has_motion: bool,
    /// Percentage of analyzed frames with motion (0-100, 2 decimals)
    pub motion_score: f64,
    /// Number of frames fed to the background model
    pub frames_analyzed: u64,
    /// Frame count reported by the container
    pub total_frames: u64,
    /// Wall-clock seconds spent analyzing (2 decimals)
    pub processing_time: f64,
}
