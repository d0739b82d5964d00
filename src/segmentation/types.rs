use image::RgbImage;

use crate::error::Result;
use crate::mask::Mask;
use crate::prompt::{Extent, Prompt};

/// One plausible region for a prompt. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCandidate {
    index: usize,
    mask: Mask,
    score: f32,
}

impl MaskCandidate {
    pub fn new(index: usize, mask: Mask, score: f32) -> Self {
        Self { index, mask, score }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}

/// Turn raw `(mask, score)` pairs into the ordered candidate list.
///
/// With `multimask` the pairs are stably sorted by descending score, so
/// equal scores keep the model's order. Without it only the highest scoring
/// pair survives. Indices are assigned after ordering.
pub fn rank_candidates(raw: Vec<(Mask, f32)>, multimask: bool) -> Vec<MaskCandidate> {
    let mut raw = raw;
    raw.sort_by(|a, b| b.1.total_cmp(&a.1));
    if !multimask {
        raw.truncate(1);
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, (mask, score))| MaskCandidate::new(index, mask, score))
        .collect()
}

/// Trait for promptable segmentation models
///
/// Models are stateful: `load_image` replaces the currently loaded image and
/// `segment` reads it. Callers sharing one model across requests go through
/// [`SharedOracle`](super::SharedOracle), which holds a lock over the pair.
pub trait SegmentationOracle: Send {
    /// Compute and keep whatever per-image state the model needs.
    fn load_image(&mut self, image: &RgbImage) -> Result<()>;

    /// Segment the loaded image.
    ///
    /// Prompt coordinates are in [`input_size`](Self::input_size) space.
    /// Points only, box only and box plus points are all accepted; which one
    /// applies follows from the populated prompt fields.
    fn segment(&mut self, prompt: &Prompt, multimask: bool) -> Result<Vec<MaskCandidate>>;

    /// Forget the loaded image.
    fn reset_state(&mut self) {
        // Default implementation: no-op for models without cached state
    }

    /// Coordinate space prompts must be expressed in.
    ///
    /// Returns (width, height)
    fn input_size(&self) -> Extent;
}
