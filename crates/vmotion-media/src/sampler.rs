//! Adaptive frame sampling.
//!
//! Only every Nth decoded frame is fed to the background model. Long videos
//! get a coarser interval so analysis cost stays bounded while short clips
//! keep their temporal coverage.

/// Videos with more frames than this use at least [`LONG_VIDEO_MIN_SKIP`].
pub const LONG_VIDEO_FRAME_THRESHOLD: u64 = 1000;

/// Minimum skip interval applied to long videos.
pub const LONG_VIDEO_MIN_SKIP: u32 = 20;

/// Deterministic frame selector for one video.
///
/// Frame numbers are 1-based; frame `n` is selected iff `n % effective_skip == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    base_skip: u32,
    effective_skip: u32,
}

impl FrameSampler {
    /// Create a sampler for a stream with `total_frames` frames.
    ///
    /// A zero `base_skip` is treated as 1 (analyze every frame).
    pub fn new(total_frames: u64, base_skip: u32) -> Self {
        let base_skip = base_skip.max(1);
        let effective_skip = if total_frames > LONG_VIDEO_FRAME_THRESHOLD {
            base_skip.max(LONG_VIDEO_MIN_SKIP)
        } else {
            base_skip
        };

        Self {
            base_skip,
            effective_skip,
        }
    }

    /// Configured base interval.
    pub fn base_skip(&self) -> u32 {
        self.base_skip
    }

    /// Interval actually used for selection.
    pub fn effective_skip(&self) -> u32 {
        self.effective_skip
    }

    /// Whether the 1-based `frame_number` is analyzed.
    pub fn should_analyze(&self, frame_number: u64) -> bool {
        frame_number > 0 && frame_number % u64::from(self.effective_skip) == 0
    }

    /// Number of frames selected out of `total_frames`.
    pub fn expected_selected(&self, total_frames: u64) -> u64 {
        total_frames / u64::from(self.effective_skip)
    }
}
