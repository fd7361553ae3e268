//! Background/foreground segmentation.
//!
//! A segmenter keeps a per-video background model and labels every pixel of
//! each frame it is fed as background, foreground or shadow.

pub mod mog2;

use ndarray::Array2;

use crate::source::Frame;

pub use mog2::{Mog2Config, Mog2Segmenter};

/// Classification of a single pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskCell {
    /// Matches the background model
    #[default]
    Background,
    /// Deviates from the background model beyond the variance threshold
    Foreground,
    /// Darkened copy of the background, cast by a moving object
    Shadow,
}

/// Per-pixel classification of one frame, same dimensions as the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ForegroundMask {
    /// Indexed `[[y, x]]`
    cells: Array2<MaskCell>,
}

impl ForegroundMask {
    /// A mask of the given size with every cell set to `cell`.
    pub fn filled(width: u32, height: u32, cell: MaskCell) -> Self {
        Self {
            cells: Array2::from_elem((height as usize, width as usize), cell),
        }
    }

    /// Wrap an already-built `(height, width)` grid.
    pub fn from_array(cells: Array2<MaskCell>) -> Self {
        Self { cells }
    }

    /// Build from row-major cells; `None` if the length does not match.
    pub fn from_cells(width: u32, height: u32, cells: Vec<MaskCell>) -> Option<Self> {
        Array2::from_shape_vec((height as usize, width as usize), cells)
            .ok()
            .map(Self::from_array)
    }

    pub fn width(&self) -> u32 {
        self.cells.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.cells.nrows() as u32
    }

    /// Total number of cells.
    pub fn pixel_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell at `(x, y)`, or `None` when out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Option<MaskCell> {
        self.cells.get((y as usize, x as usize)).copied()
    }

    /// Overwrite the cell at `(x, y)`; out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, cell: MaskCell) {
        if let Some(slot) = self.cells.get_mut((y as usize, x as usize)) {
            *slot = cell;
        }
    }

    /// Number of cells with the given label.
    pub fn count(&self, cell: MaskCell) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    pub fn foreground_count(&self) -> usize {
        self.count(MaskCell::Foreground)
    }

    pub fn shadow_count(&self) -> usize {
        self.count(MaskCell::Shadow)
    }

    /// Iterate cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &MaskCell> {
        self.cells.iter()
    }
}

/// A stateful background model that classifies frames one at a time.
///
/// Implementations update their statistics on every frame, including the
/// first one which seeds the model. Classification never fails: a
/// segmenter fed a frame of a new size starts a fresh model.
pub trait BackgroundSubtractor {
    /// Update the model with `frame` and return its classification.
    fn classify(&mut self, frame: &Frame) -> ForegroundMask;

    /// Discard all learned state.
    fn reset(&mut self);

    /// Frames seen since the model was (re)seeded.
    fn frames_seen(&self) -> u64;
}
