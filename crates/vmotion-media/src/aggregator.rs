//! Folds per-frame masks into a video-level motion score.

use vmotion_models::analysis::{DEFAULT_MOTION_THRESHOLD, DEFAULT_VIDEO_SCORE_THRESHOLD};
use vmotion_models::{AnalysisConfig, ShadowPolicy};

use crate::segmenter::{ForegroundMask, MaskCell};

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Final score of one video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionScore {
    /// Percentage of analyzed frames that had motion, 2 decimals
    pub motion_score: f64,
    /// `motion_score > video_score_threshold`
    pub has_motion: bool,
    pub frames_analyzed: u64,
    pub frames_with_motion: u64,
}

/// Counts motion frames across a video.
#[derive(Debug, Clone)]
pub struct MotionAggregator {
    per_frame_threshold: f64,
    video_score_threshold: f64,
    shadow_policy: ShadowPolicy,
    frames_analyzed: u64,
    frames_with_motion: u64,
}

impl Default for MotionAggregator {
    fn default() -> Self {
        Self::new(
            DEFAULT_MOTION_THRESHOLD,
            DEFAULT_VIDEO_SCORE_THRESHOLD,
            ShadowPolicy::default(),
        )
    }
}

impl MotionAggregator {
    pub fn new(
        per_frame_threshold: f64,
        video_score_threshold: f64,
        shadow_policy: ShadowPolicy,
    ) -> Self {
        Self {
            per_frame_threshold,
            video_score_threshold,
            shadow_policy,
            frames_analyzed: 0,
            frames_with_motion: 0,
        }
    }

    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self::new(
            config.motion_threshold,
            config.video_score_threshold,
            config.shadow_policy,
        )
    }

    /// Fraction of the mask's pixels that count as motion under the shadow policy.
    ///
    /// An empty mask has no motion.
    pub fn motion_ratio(&self, mask: &ForegroundMask) -> f64 {
        let total = mask.pixel_count();
        if total == 0 {
            return 0.0;
        }

        let moving = mask
            .iter()
            .filter(|&&cell| match cell {
                MaskCell::Foreground => true,
                MaskCell::Shadow => self.shadow_policy.counts_shadows(),
                MaskCell::Background => false,
            })
            .count();

        moving as f64 / total as f64
    }

    /// Record one analyzed frame. Returns whether it counted as a motion frame.
    pub fn accumulate(&mut self, mask: &ForegroundMask) -> bool {
        let is_motion = self.motion_ratio(mask) > self.per_frame_threshold;
        if is_motion {
            self.frames_with_motion += 1;
        }
        self.frames_analyzed += 1;
        is_motion
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn frames_with_motion(&self) -> u64 {
        self.frames_with_motion
    }

    /// Score the frames accumulated so far.
    ///
    /// With no analyzed frames the score is 0 and there is no motion.
    pub fn score(&self) -> MotionScore {
        let motion_score = if self.frames_analyzed > 0 {
            round2(self.frames_with_motion as f64 / self.frames_analyzed as f64 * 100.0)
        } else {
            0.0
        };

        MotionScore {
            motion_score,
            has_motion: motion_score > self.video_score_threshold,
            frames_analyzed: self.frames_analyzed,
            frames_with_motion: self.frames_with_motion,
        }
    }
}
