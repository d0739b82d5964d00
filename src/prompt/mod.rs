//! Prompt points, boxes and their mapping into model space.

mod builder;
mod coords;
pub mod types;

pub use builder::{PromptBuilder, MAX_POINTS_PER_LABEL};
pub use coords::{scale_box, scale_point, CoordinateMapper, DEFAULT_ORIGINAL_EXTENT};
pub use types::{BoxRegion, Extent, Label, Point, Prompt, PromptMode};
