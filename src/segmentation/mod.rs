mod sam;
mod shared;
pub mod types;

pub use sam::{SegmentAnything, DECODER_INPUTS};
pub use shared::SharedOracle;
pub use types::{rank_candidates, MaskCandidate, SegmentationOracle};

pub(crate) use sam::extract;

use crate::config::SegmentationConfig;
use crate::error::Result;

/// Create the default segmentation model (Segment Anything)
pub fn create_default_model(config: &SegmentationConfig) -> Result<Box<dyn SegmentationOracle>> {
    let model = SegmentAnything::new(
        &config.encoder,
        &config.decoder,
        config.input_size,
        config.mask_threshold,
        &config.decoder_rules,
    )?;
    Ok(Box::new(model))
}
