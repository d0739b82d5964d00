use image::{imageops, DynamicImage, GrayImage, Luma};

use crate::error::{Error, Result};
use crate::prompt::Extent;

/// Grey level at or above which a pixel counts as inside the mask.
pub const BINARY_THRESHOLD: u8 = 128;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Single-channel mask whose pixels are exactly 0 or 255.
///
/// Every constructor thresholds, so a `Mask` value is binary by
/// construction. Resizing always uses nearest-neighbour sampling; any
/// smoothing filter would reintroduce intermediate levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// Threshold a grey image at [`BINARY_THRESHOLD`].
    pub fn from_gray(mut gray: GrayImage) -> Self {
        for p in gray.pixels_mut() {
            p[0] = binarize_value(p[0]);
        }
        Self(gray)
    }

    /// Convert any image (RGB, RGBA, grey) to a binary mask.
    pub fn from_image(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray.clone()),
            other => Self::from_gray(other.to_luma8()),
        }
    }

    /// Build a mask from row-major scores, marking `score > threshold`.
    ///
    /// Used for raw model output (logits or probabilities).
    pub fn from_scores(scores: &[f32], width: u32, height: u32, threshold: f32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if scores.len() != expected {
            return Err(Error::mismatch(format!(
                "{} mask scores for a {width}x{height} mask",
                scores.len()
            )));
        }
        let data = scores
            .iter()
            .map(|&s| if s > threshold { MASK_ON } else { MASK_OFF })
            .collect();
        GrayImage::from_raw(width, height, data)
            .map(Self)
            .ok_or_else(|| Error::mismatch("mask buffer does not match extent"))
    }

    pub fn filled(extent: Extent, on: bool) -> Self {
        let v = if on { MASK_ON } else { MASK_OFF };
        Self(GrayImage::from_pixel(extent.width, extent.height, Luma([v])))
    }

    pub fn extent(&self) -> Extent {
        self.0.dimensions().into()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] == MASK_ON
    }

    pub fn count_set(&self) -> usize {
        self.0.pixels().filter(|p| p[0] == MASK_ON).count()
    }

    /// Bitwise complement: 255 becomes 0 and 0 becomes 255.
    pub fn inverted(&self) -> Self {
        let mut gray = self.0.clone();
        imageops::invert(&mut gray);
        Self(gray)
    }

    /// Nearest-neighbour resize to `extent`, re-thresholded.
    pub fn resized(&self, extent: Extent) -> Result<Self> {
        if self.extent().is_empty() || extent.is_empty() {
            return Err(Error::mismatch(format!(
                "cannot resize a {} mask to {extent}",
                self.extent()
            )));
        }
        if self.extent() == extent {
            return Ok(self.clone());
        }
        let resized = imageops::resize(
            &self.0,
            extent.width,
            extent.height,
            imageops::FilterType::Nearest,
        );
        Ok(Self::from_gray(resized))
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}

#[inline]
pub fn binarize_value(v: u8) -> u8 {
    if v >= BINARY_THRESHOLD {
        MASK_ON
    } else {
        MASK_OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn is_binary(mask: &Mask) -> bool {
        mask.as_gray().pixels().all(|p| p[0] == MASK_ON || p[0] == MASK_OFF)
    }

    #[test]
    fn threshold_is_inclusive_at_128() {
        let gray = GrayImage::from_raw(4, 1, vec![0, 127, 128, 255]).unwrap();
        let mask = Mask::from_gray(gray);
        assert_eq!(mask.as_gray().as_raw(), &vec![0, 0, 255, 255]);
    }

    #[test]
    fn colour_masks_are_converted_to_single_channel() {
        let rgb = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([10, 10, 10])
            }
        });
        let mask = Mask::from_image(&DynamicImage::ImageRgb8(rgb));
        assert!(mask.is_set(0, 0));
        assert!(!mask.is_set(1, 0));
    }

    #[test]
    fn resize_keeps_masks_binary() {
        let gray = GrayImage::from_fn(7, 5, |x, y| Luma([if (x + y) % 2 == 0 { 255 } else { 0 }]));
        let mask = Mask::from_gray(gray);
        for extent in [Extent::new(100, 33), Extent::new(3, 2), Extent::new(1, 1)] {
            let resized = mask.resized(extent).unwrap();
            assert_eq!(resized.extent(), extent);
            assert!(is_binary(&resized));
        }
    }

    #[test]
    fn resize_to_zero_is_a_mismatch() {
        let mask = Mask::filled(Extent::new(4, 4), true);
        let err = mask.resized(Extent::new(0, 4)).unwrap_err();
        assert!(matches!(err, Error::ResourceMismatch(_)));
    }

    #[test]
    fn inversion_partitions_pixels() {
        let gray = GrayImage::from_fn(8, 8, |x, _| Luma([if x < 3 { 255 } else { 0 }]));
        let mask = Mask::from_gray(gray);
        let inv = mask.inverted();
        assert_eq!(mask.count_set() + inv.count_set(), 64);
        for (a, b) in mask.as_gray().pixels().zip(inv.as_gray().pixels()) {
            assert_ne!(a[0], b[0]);
        }
    }

    #[test]
    fn scores_are_thresholded() {
        let mask = Mask::from_scores(&[-3.0, 0.0, 0.1, 7.5], 2, 2, 0.0).unwrap();
        assert_eq!(mask.as_gray().as_raw(), &vec![0, 0, 255, 255]);
        assert!(Mask::from_scores(&[1.0; 3], 2, 2, 0.0).is_err());
    }
}
