//! Conversion between RGB images and NCHW model tensors.

use image::{imageops, RgbImage};
use ndarray::{Array4, ArrayView4};

use crate::error::{Error, Result};
use crate::prompt::Extent;

/// Pixel value mapping applied before inference and undone after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// `[0, 255] -> [0, 1]`
    Unit,
    /// `[0, 255] -> [-1, 1]`, the range of tanh-output generators.
    Symmetric,
    /// Per-channel `(v - mean) / std` over raw `[0, 255]` values.
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    /// ImageNet statistics used by the Segment Anything encoder.
    pub const IMAGENET: Self = Self::MeanStd {
        mean: [123.675, 116.28, 103.53],
        std: [58.395, 57.12, 57.375],
    };

    #[inline]
    fn forward(&self, channel: usize, v: u8) -> f32 {
        let v = f32::from(v);
        match self {
            Self::Unit => v / 255.0,
            Self::Symmetric => v / 127.5 - 1.0,
            Self::MeanStd { mean, std } => (v - mean[channel]) / std[channel],
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn inverse(&self, channel: usize, v: f32) -> u8 {
        let scaled = match self {
            Self::Unit => v * 255.0,
            Self::Symmetric => (v + 1.0) * 127.5,
            Self::MeanStd { mean, std } => v * std[channel] + mean[channel],
        };
        scaled.clamp(0.0, 255.0) as u8
    }
}

/// Resizes images to a model's working resolution and converts them to
/// and from `[1, 3, H, W]` tensors.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    filter: imageops::FilterType,
    normalization: Normalization,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            filter: imageops::FilterType::CatmullRom,
            normalization: Normalization::Unit,
        }
    }

    pub fn with_filter(mut self, filter: imageops::FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn target(&self) -> Extent {
        Extent::new(self.target_width, self.target_height)
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        if image.width() == 0 || image.height() == 0 {
            return Err(Error::mismatch("cannot preprocess an empty image"));
        }

        let resized = self.resize(image, self.target());

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = self.normalization.forward(c, pixel[c]);
            }
        }

        Ok(tensor)
    }

    /// Convert a `[1, 3, H, W]` tensor back into an RGB image at tensor
    /// resolution, undoing the normalization.
    #[allow(clippy::cast_possible_truncation)]
    pub fn postprocess(&self, tensor: ArrayView4<'_, f32>) -> Result<RgbImage> {
        let _span = tracing::debug_span!("postprocess").entered();

        let shape = tensor.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(Error::mismatch(format!(
                "expected a [1, 3, H, W] tensor, got {shape:?}"
            )));
        }
        let (height, width) = (shape[2] as u32, shape[3] as u32);

        Ok(RgbImage::from_fn(width, height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            image::Rgb([
                self.normalization.inverse(0, tensor[[0, 0, y, x]]),
                self.normalization.inverse(1, tensor[[0, 1, y, x]]),
                self.normalization.inverse(2, tensor[[0, 2, y, x]]),
            ])
        }))
    }

    /// Resize with this preprocessor's smooth filter; returns a copy when
    /// the image already has the requested extent.
    pub fn resize(&self, image: &RgbImage, extent: Extent) -> RgbImage {
        if image.dimensions() == (extent.width, extent.height) {
            image.clone()
        } else {
            imageops::resize(image, extent.width, extent.height, self.filter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_shape_follows_target() {
        let img = RgbImage::new(100, 40);
        let tensor = Preprocessor::new(64, 32).preprocess(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 64]);
    }

    #[test]
    fn symmetric_range_of_black_image() {
        let img = RgbImage::new(8, 8);
        let tensor = Preprocessor::new(8, 8)
            .with_normalization(Normalization::Symmetric)
            .preprocess(&img)
            .unwrap();
        assert!(tensor.iter().all(|v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn postprocess_inverts_preprocess() {
        let img = RgbImage::from_fn(4, 3, |x, y| image::Rgb([(x * 60) as u8, (y * 80) as u8, 200]));
        for norm in [
            Normalization::Unit,
            Normalization::Symmetric,
            Normalization::IMAGENET,
        ] {
            let pre = Preprocessor::new(4, 3).with_normalization(norm);
            let back = pre.postprocess(pre.preprocess(&img).unwrap().view()).unwrap();
            for (a, b) in img.pixels().zip(back.pixels()) {
                for c in 0..3 {
                    assert!((i16::from(a[c]) - i16::from(b[c])).abs() <= 1, "{norm:?}");
                }
            }
        }
    }

    #[test]
    fn postprocess_clamps_out_of_range_values() {
        let tensor = Array4::from_elem((1, 3, 1, 1), 3.0f32);
        let pre = Preprocessor::new(1, 1).with_normalization(Normalization::Symmetric);
        assert_eq!(pre.postprocess(tensor.view()).unwrap().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn empty_images_are_rejected() {
        let err = Preprocessor::new(8, 8).preprocess(&RgbImage::new(0, 4)).unwrap_err();
        assert!(matches!(err, Error::ResourceMismatch(_)));
    }
}
