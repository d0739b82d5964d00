use super::types::{BoxRegion, Extent, Point};
use crate::error::{Error, Result};

/// Original extent assumed when a client does not report the size it
/// displayed the image at.
pub const DEFAULT_ORIGINAL_EXTENT: Extent = Extent::new(1024, 1024);

/// Rescale `point` from `original` space into `target` space.
///
/// `x' = floor(x * target_w / original_w)`, likewise for `y`. Coordinates at
/// or beyond the original edge are clamped to the last target pixel.
pub fn scale_point(point: Point, original: Extent, target: Extent) -> Result<Point> {
    if original.is_empty() {
        return Err(Error::validation(format!(
            "original extent must be positive, got {original}"
        )));
    }
    if target.is_empty() {
        return Err(Error::validation(format!(
            "target extent must be positive, got {target}"
        )));
    }

    Ok(Point::new(
        scale_axis(point.x, original.width, target.width),
        scale_axis(point.y, original.height, target.height),
    ))
}

/// Scale both corners independently, then order them per axis.
pub fn scale_box(a: Point, b: Point, original: Extent, target: Extent) -> Result<BoxRegion> {
    let a = scale_point(a, original, target)?;
    let b = scale_point(b, original, target)?;
    Ok(BoxRegion::from_corners(a, b))
}

#[allow(clippy::cast_possible_truncation)]
fn scale_axis(v: u32, original: u32, target: u32) -> u32 {
    let scaled = u64::from(v) * u64::from(target) / u64::from(original);
    // Fits: clamped below `target`, which is a u32.
    scaled.min(u64::from(target) - 1) as u32
}

/// Maps UI-space prompts into the segmentation model's coordinate space.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    target: Extent,
    default_original: Extent,
}

impl CoordinateMapper {
    pub fn new(target: Extent) -> Self {
        Self {
            target,
            default_original: DEFAULT_ORIGINAL_EXTENT,
        }
    }

    /// Override the extent substituted when the client omits `original_size`.
    pub fn with_default_original(mut self, extent: Extent) -> Self {
        self.default_original = extent;
        self
    }

    /// The extent actually used for a request.
    pub fn resolve_original(&self, original: Option<Extent>) -> Extent {
        match original {
            Some(extent) => extent,
            None => {
                tracing::debug!(
                    "No original size supplied, assuming {}",
                    self.default_original
                );
                self.default_original
            }
        }
    }

    pub fn map_point(&self, point: Point, original: Option<Extent>) -> Result<Point> {
        scale_point(point, self.resolve_original(original), self.target)
    }

    pub fn map_points(&self, points: &[Point], original: Option<Extent>) -> Result<Vec<Point>> {
        let original = self.resolve_original(original);
        points
            .iter()
            .map(|&p| scale_point(p, original, self.target))
            .collect()
    }

    pub fn map_box(&self, a: Point, b: Point, original: Option<Extent>) -> Result<BoxRegion> {
        scale_box(a, b, self.resolve_original(original), self.target)
    }
}
