//! Adaptive Gaussian mixture background model (Zivkovic MOG2).
//!
//! Each pixel carries up to [`MAX_GAUSSIANS`] weighted Gaussians over RGB.
//! Every frame updates the mixture online: a matching Gaussian absorbs the
//! sample, otherwise a new one is spawned in place of the weakest. The
//! heaviest Gaussians whose weights add up to [`BACKGROUND_RATIO`] describe
//! the background.
//!
//! # Classification
//! - Background: within `var_threshold` (squared Mahalanobis) of a background Gaussian
//! - Shadow: a scaled copy `a * mean` of a background Gaussian, `SHADOW_THRESHOLD <= a <= 1`
//! - Foreground: everything else
//!
//! The learning rate is `1 / min(2 * frames_seen, history)`, so early frames
//! adapt quickly and the model settles as history accumulates.

use tracing::{debug, warn};

use vmotion_models::analysis::{DEFAULT_HISTORY_LENGTH, DEFAULT_VARIANCE_THRESHOLD};
use vmotion_models::AnalysisConfig;

use super::{BackgroundSubtractor, ForegroundMask, MaskCell};
use crate::source::Frame;
use ndarray::Array2;

/// Maximum Gaussians per pixel.
pub const MAX_GAUSSIANS: usize = 5;
/// Cumulative weight of the Gaussians that model the background.
pub const BACKGROUND_RATIO: f32 = 0.9;
/// Distance threshold for a sample to update an existing Gaussian.
pub const VAR_THRESHOLD_GEN: f32 = 9.0;
/// Variance of a newly spawned Gaussian.
pub const VAR_INIT: f32 = 15.0;
pub const VAR_MIN: f32 = 4.0;
pub const VAR_MAX: f32 = 75.0;
/// Prior that prunes Gaussians with negligible support.
pub const COMPLEXITY_REDUCTION: f32 = 0.05;
/// Lowest brightness ratio still considered a shadow.
pub const SHADOW_THRESHOLD: f32 = 0.5;

/// Background model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Mog2Config {
    /// Frames contributing to the background estimate
    pub history: u32,
    /// Squared Mahalanobis distance above which a pixel is foreground
    pub var_threshold: f32,
    /// Label shadows separately from foreground
    pub detect_shadows: bool,
    pub max_gaussians: usize,
    pub background_ratio: f32,
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    pub complexity_reduction: f32,
    pub shadow_threshold: f32,
}

impl Default for Mog2Config {
    fn default() -> Self {
        Self {
            history: DEFAULT_HISTORY_LENGTH,
            var_threshold: DEFAULT_VARIANCE_THRESHOLD as f32,
            detect_shadows: true,
            max_gaussians: MAX_GAUSSIANS,
            background_ratio: BACKGROUND_RATIO,
            var_threshold_gen: VAR_THRESHOLD_GEN,
            var_init: VAR_INIT,
            var_min: VAR_MIN,
            var_max: VAR_MAX,
            complexity_reduction: COMPLEXITY_REDUCTION,
            shadow_threshold: SHADOW_THRESHOLD,
        }
    }
}

impl Mog2Config {
    /// Derive model parameters from an analysis config.
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self {
            history: config.history_length,
            var_threshold: config.variance_threshold as f32,
            detect_shadows: config.shadow_detection,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Gaussian {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Per-pixel mixture state for one frame geometry.
#[derive(Debug, Clone)]
struct BackgroundModel {
    width: u32,
    height: u32,
    max_gaussians: usize,
    /// `max_gaussians` slots per pixel, sorted by descending weight
    gaussians: Vec<Gaussian>,
    /// Live Gaussians per pixel
    modes_used: Vec<u8>,
}

impl BackgroundModel {
    fn new(width: u32, height: u32, max_gaussians: usize) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            max_gaussians,
            gaussians: vec![Gaussian::default(); pixels * max_gaussians],
            modes_used: vec![0; pixels],
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_mut(&mut self, index: usize) -> (&mut [Gaussian], &mut u8) {
        let start = index * self.max_gaussians;
        (
            &mut self.gaussians[start..start + self.max_gaussians],
            &mut self.modes_used[index],
        )
    }
}

/// MOG2 background subtractor; one instance per video.
#[derive(Debug, Clone)]
pub struct Mog2Segmenter {
    config: Mog2Config,
    model: Option<BackgroundModel>,
    frames_seen: u64,
}

impl Mog2Segmenter {
    pub fn new(config: Mog2Config) -> Self {
        Self {
            config,
            model: None,
            frames_seen: 0,
        }
    }

    /// Create a segmenter for an analysis config.
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self::new(Mog2Config::from_analysis(config))
    }

    pub fn config(&self) -> &Mog2Config {
        &self.config
    }

    /// Learning rate applied to the next frame.
    pub fn learning_rate(&self) -> f32 {
        let window = (2 * (self.frames_seen + 1)).min(u64::from(self.config.history.max(1)));
        1.0 / window as f32
    }
}

impl Default for Mog2Segmenter {
    fn default() -> Self {
        Self::new(Mog2Config::default())
    }
}

impl BackgroundSubtractor for Mog2Segmenter {
    fn classify(&mut self, frame: &Frame) -> ForegroundMask {
        let (width, height) = frame.dimensions();

        if let Some(model) = &self.model {
            if model.dimensions() != (width, height) {
                warn!(
                    old = ?model.dimensions(),
                    new = ?(width, height),
                    "Frame size changed, re-seeding background model"
                );
                self.model = None;
                self.frames_seen = 0;
            }
        }

        let alpha = self.learning_rate();
        self.frames_seen += 1;

        let config = &self.config;
        let max_gaussians = config.max_gaussians.clamp(1, u8::MAX as usize);
        let model = self
            .model
            .get_or_insert_with(|| BackgroundModel::new(width, height, max_gaussians));

        let cells = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            let px = frame.get_pixel(x as u32, y as u32);
            let sample = [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])];
            let (modes, used) = model.pixel_mut(y * width as usize + x);
            update_pixel(config, alpha, sample, modes, used)
        });

        let mask = ForegroundMask::from_array(cells);
        debug!(
            frame = self.frames_seen,
            alpha,
            foreground = mask.foreground_count(),
            shadow = mask.shadow_count(),
            "Background model updated"
        );
        mask
    }

    fn reset(&mut self) {
        self.model = None;
        self.frames_seen = 0;
    }

    fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

/// Update one pixel's mixture with `sample` and label it.
fn update_pixel(
    config: &Mog2Config,
    alpha: f32,
    sample: [f32; 3],
    modes: &mut [Gaussian],
    used: &mut u8,
) -> MaskCell {
    let mut n = usize::from(*used);

    // Seed: nothing to compare against yet.
    if n == 0 {
        modes[0] = Gaussian {
            weight: 1.0,
            variance: config.var_init,
            mean: sample,
        };
        *used = 1;
        return MaskCell::Background;
    }

    let alpha1 = 1.0 - alpha;
    let prune = -alpha * config.complexity_reduction;

    let mut fits = false;
    let mut background = false;
    let mut total_weight = 0.0f32;

    for g in modes[..n].iter_mut() {
        let mut weight = alpha1 * g.weight + prune;

        if !fits {
            let diff = [
                g.mean[0] - sample[0],
                g.mean[1] - sample[1],
                g.mean[2] - sample[2],
            ];
            let dist2 = diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2];

            if total_weight < config.background_ratio && dist2 < config.var_threshold * g.variance {
                background = true;
            }

            if dist2 < config.var_threshold_gen * g.variance {
                fits = true;
                weight += alpha;

                let k = alpha / weight;
                for (mean, d) in g.mean.iter_mut().zip(diff) {
                    *mean -= k * d;
                }
                g.variance = (g.variance + k * (dist2 - g.variance))
                    .clamp(config.var_min, config.var_max);
            }
        }

        if weight < -prune {
            weight = 0.0;
        }
        g.weight = weight;
        total_weight += weight;
    }

    sort_by_weight(&mut modes[..n]);
    while n > 0 && modes[n - 1].weight <= 0.0 {
        n -= 1;
    }

    if total_weight > 0.0 {
        for g in modes[..n].iter_mut() {
            g.weight /= total_weight;
        }
    }

    if !fits {
        // Replace the weakest Gaussian when full.
        if n == modes.len() {
            n -= 1;
        }

        if n == 0 {
            modes[0] = Gaussian {
                weight: 1.0,
                variance: config.var_init,
                mean: sample,
            };
        } else {
            for g in modes[..n].iter_mut() {
                g.weight *= alpha1;
            }
            modes[n] = Gaussian {
                weight: alpha,
                variance: config.var_init,
                mean: sample,
            };
        }
        n += 1;
        sort_by_weight(&mut modes[..n]);
    }

    *used = n as u8;

    if background {
        MaskCell::Background
    } else if config.detect_shadows && is_shadow(config, sample, &modes[..n]) {
        MaskCell::Shadow
    } else {
        MaskCell::Foreground
    }
}

fn sort_by_weight(modes: &mut [Gaussian]) {
    modes.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}

/// Whether `sample` is a darkened version of one of the background Gaussians.
fn is_shadow(config: &Mog2Config, sample: [f32; 3], modes: &[Gaussian]) -> bool {
    let mut total_weight = 0.0f32;

    for g in modes {
        let numerator: f32 = g.mean.iter().zip(sample).map(|(m, s)| m * s).sum();
        let denominator: f32 = g.mean.iter().map(|m| m * m).sum();

        if denominator == 0.0 {
            return false;
        }

        if numerator <= denominator && numerator >= config.shadow_threshold * denominator {
            let a = numerator / denominator;
            let dist2a: f32 = g
                .mean
                .iter()
                .zip(sample)
                .map(|(m, s)| {
                    let d = a * m - s;
                    d * d
                })
                .sum();

            if dist2a < config.var_threshold * g.variance * a * a {
                return true;
            }
        }

        total_weight += g.weight;
        if total_weight > config.background_ratio {
            return false;
        }
    }

    false
}
