//! Binary masks and candidate export.

mod export;
mod ops;

pub use export::{CandidateArtifacts, CandidateMaskManager, ExportOptions, RenderedCandidate};
pub use ops::{binarize_value, Mask, BINARY_THRESHOLD, MASK_OFF, MASK_ON};
