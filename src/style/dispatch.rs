use std::sync::Arc;

use image::{DynamicImage, RgbImage};

use super::registry::StyleRegistry;
use super::types::{BackendVariant, Region};
use crate::composite::{black_cutout, compose};
use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::prompt::Extent;

/// Result of one style request.
#[derive(Debug, Clone)]
pub struct StyleOutcome {
    /// Source-sized composite; pixels outside the restyled region are the
    /// source pixels.
    pub image: RgbImage,
    /// Registry id of the backend that produced `image`.
    pub backend: String,
    /// The requested id was unknown and the default backend was used.
    pub fallback: bool,
}

/// Routes style requests to backends and recomposites their output.
#[derive(Clone)]
pub struct StyleDispatcher {
    registry: Arc<StyleRegistry>,
}

impl StyleDispatcher {
    pub fn new(registry: Arc<StyleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    /// Restyle `region` of `source`.
    ///
    /// `raw_mask` may be colour or grey at any extent; it is converted to a
    /// binary mask and resized to the source with nearest-neighbour sampling.
    /// Foreground requests always stylize the masked-in crop. Background
    /// requests stylize the whole frame or the masked-out crop, depending on
    /// the backend variant. The final composite guarantees that pixels
    /// outside the region are untouched.
    pub fn dispatch(
        &self,
        style_id: &str,
        region: Region,
        source: &RgbImage,
        raw_mask: &DynamicImage,
    ) -> Result<StyleOutcome> {
        let _span = tracing::debug_span!("dispatch", style = style_id, %region).entered();

        let extent = Extent::from(source.dimensions());
        if extent.is_empty() {
            return Err(Error::mismatch("source image is empty"));
        }
        let mask = Mask::from_image(raw_mask).resized(extent)?;

        let resolved = self.registry.resolve(style_id)?;
        let backend = &resolved.backend;

        // Pick what the backend sees
        let input = match (region, backend.variant()) {
            (Region::Foreground, _) => black_cutout(source, &mask)?,
            (Region::Background, BackendVariant::Region) => black_cutout(source, &mask.inverted())?,
            (Region::Background, BackendVariant::FullFrame) => source.clone(),
        };

        // Stylize
        let styled = backend.stylize(&input)?;
        if styled.dimensions() != source.dimensions() {
            return Err(Error::mismatch(format!(
                "backend {} returned {} for a {extent} source",
                resolved.id,
                Extent::from(styled.dimensions())
            )));
        }

        // Composite back over the untouched source
        let image = compose(source, &styled, &mask, region.inverts_mask())?;
        tracing::info!(
            "Styled {} with {}{}",
            region,
            resolved.id,
            if resolved.fallback { " (fallback)" } else { "" }
        );

        Ok(StyleOutcome {
            image,
            backend: resolved.id,
            fallback: resolved.fallback,
        })
    }
}
