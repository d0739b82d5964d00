use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use ndarray::{Array4, Axis};

use super::types::{BackendVariant, InputMode, StyleBackend, StyleNetwork};
use crate::error::{Error, Result};
use crate::preprocess::{Normalization, Preprocessor};
use crate::prompt::Extent;

/// Sigma of the smoothing pass that follows histogram equalization, about
/// what a 3x3 Gaussian kernel gives.
const SMOOTHING_SIGMA: f32 = 0.8;

/// Bilateral filter used by the structure pass.
const STRUCTURE_WINDOW: u32 = 7;
const STRUCTURE_SIGMA_COLOR: f32 = 25.0;
const STRUCTURE_SIGMA_SPATIAL: f32 = 3.0;

/// Source luma below which the dark blend applies.
const DARK_LUMA: u8 = 50;
/// Share of the contrast-limited equalized source in a dark pixel.
const DARK_BLEND: f32 = 0.3;
const CLAHE_GRID: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Stylization backend driving one generator network.
///
/// The image is resampled to the network's working size with a cubic
/// filter, mapped to `[-1, 1]`, run, mapped back and resampled to its
/// original extent.
pub struct GeneratorBackend {
    name: String,
    variant: BackendVariant,
    input_mode: InputMode,
    structure: bool,
    dark_boost: bool,
    equalize: bool,
    network: Box<dyn StyleNetwork>,
}

impl GeneratorBackend {
    pub fn new(
        name: impl Into<String>,
        variant: BackendVariant,
        network: Box<dyn StyleNetwork>,
    ) -> Self {
        Self {
            name: name.into(),
            variant,
            input_mode: InputMode::Rgb,
            structure: false,
            dark_boost: false,
            equalize: false,
            network,
        }
    }

    pub fn with_input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    /// Run an edge-preserving filter over the input before inference.
    pub fn with_structure(mut self, structure: bool) -> Self {
        self.structure = structure;
        self
    }

    /// Blend the contrast-limited equalized source luma back into pixels
    /// that were dark in the source.
    pub fn with_dark_boost(mut self, dark_boost: bool) -> Self {
        self.dark_boost = dark_boost;
        self
    }

    /// Equalize the luma histogram and smooth lightly after stylization.
    pub fn with_equalize(mut self, equalize: bool) -> Self {
        self.equalize = equalize;
        self
    }

    fn preprocessor(&self) -> Preprocessor {
        let working = self.network.working_size();
        Preprocessor::new(working.width, working.height)
            .with_filter(imageops::FilterType::CatmullRom)
            .with_normalization(Normalization::Symmetric)
    }

    fn infer(&self, pre: &Preprocessor, image: &RgbImage) -> Result<Array4<f32>> {
        let output = self.network.run(pre.preprocess(image)?)?;
        let shape = output.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            return Err(Error::inference(
                "generator",
                format!("{} returned a {shape:?} tensor", self.name),
            ));
        }
        Ok(output)
    }

    fn stylize_rgb(&self, image: &RgbImage) -> Result<RgbImage> {
        let pre = self.preprocessor();
        let output = self.infer(&pre, image)?;
        let styled = pre.postprocess(output.view())?;

        // Back to the caller's extent
        Ok(pre.resize(&styled, image.dimensions().into()))
    }

    fn stylize_luminance(&self, image: &RgbImage) -> Result<RgbImage> {
        let pre = self.preprocessor();
        let (luma, chroma) = split_luma(image);

        // The network sees luma replicated into three channels
        let luma_rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let v = luma.get_pixel(x, y)[0];
            Rgb([v, v, v])
        });
        let output = self.infer(&pre, &luma_rgb)?;

        // Average the output channels into a new luma plane
        let mean = output
            .mean_axis(Axis(1))
            .ok_or_else(|| Error::inference("generator", "empty channel axis"))?;
        let (h, w) = (mean.shape()[1], mean.shape()[2]);
        #[allow(clippy::cast_possible_truncation)]
        let styled_luma = GrayImage::from_fn(w as u32, h as u32, |x, y| {
            Luma([denormalize(mean[[0, y as usize, x as usize]])])
        });

        let styled_luma = imageops::resize(
            &styled_luma,
            image.width(),
            image.height(),
            imageops::FilterType::Triangle,
        );
        Ok(merge_luma(&styled_luma, &chroma))
    }
}

impl StyleBackend for GeneratorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> BackendVariant {
        self.variant
    }

    fn stylize(&self, image: &RgbImage) -> Result<RgbImage> {
        let _span = tracing::debug_span!("stylize", backend = %self.name).entered();

        if Extent::from(image.dimensions()).is_empty() {
            return Err(Error::mismatch("cannot stylize an empty image"));
        }

        let enhanced;
        let input = if self.structure {
            enhanced = enhance_structure(image);
            &enhanced
        } else {
            image
        };

        // Run inference
        let mut styled = match self.input_mode {
            InputMode::Rgb => self.stylize_rgb(input)?,
            InputMode::Luminance => self.stylize_luminance(input)?,
        };

        // Post-passes, in order
        if self.dark_boost {
            styled = lift_dark_regions(input, &styled);
        }
        if self.equalize {
            styled = equalize_and_smooth(&styled);
        }
        Ok(styled)
    }
}

/// `[-1, 1] -> [0, 255]` with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    ((value + 1.0) * 127.5).clamp(0.0, 255.0) as u8
}

/// BT.601 luma plane plus per-pixel `(Cb, Cr)` offsets.
fn split_luma(image: &RgbImage) -> (GrayImage, Vec<(f32, f32)>) {
    let mut chroma = Vec::with_capacity((image.width() * image.height()) as usize);
    let luma = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(f32::from);
        chroma.push((
            -0.168_736 * r - 0.331_264 * g + 0.5 * b,
            0.5 * r - 0.418_688 * g - 0.081_312 * b,
        ));
        Luma([to_u8(0.299 * r + 0.587 * g + 0.114 * b)])
    });
    (luma, chroma)
}

fn merge_luma(luma: &GrayImage, chroma: &[(f32, f32)]) -> RgbImage {
    let width = luma.width();
    RgbImage::from_fn(width, luma.height(), |x, y| {
        let yv = f32::from(luma.get_pixel(x, y)[0]);
        let (cb, cr) = chroma[(y * width + x) as usize];
        Rgb([
            to_u8(yv + 1.402 * cr),
            to_u8(yv - 0.344_136 * cb - 0.714_136 * cr),
            to_u8(yv + 1.772 * cb),
        ])
    })
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Bilateral-filter every channel: flattens texture, keeps edges.
fn enhance_structure(image: &RgbImage) -> RgbImage {
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(image.width(), image.height(), |x, y| {
                Luma([image.get_pixel(x, y)[c]])
            });
            bilateral_filter(
                &plane,
                STRUCTURE_WINDOW,
                STRUCTURE_SIGMA_COLOR,
                STRUCTURE_SIGMA_SPATIAL,
            )
        })
        .collect();

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

/// Where `source` luma is below [`DARK_LUMA`], mix the CLAHE of the source
/// luma into the styled luma. Chroma is the styled image's.
fn lift_dark_regions(source: &RgbImage, styled: &RgbImage) -> RgbImage {
    let (source_luma, _) = split_luma(source);
    let boosted = clahe(&source_luma, CLAHE_GRID, CLAHE_CLIP_LIMIT);
    let (mut luma, chroma) = split_luma(styled);

    for (x, y, p) in luma.enumerate_pixels_mut() {
        if source_luma.get_pixel(x, y)[0] < DARK_LUMA {
            let lifted = f32::from(boosted.get_pixel(x, y)[0]);
            p[0] = to_u8(DARK_BLEND * lifted + (1.0 - DARK_BLEND) * f32::from(p[0]));
        }
    }
    merge_luma(&luma, &chroma)
}

/// Contrast-limited adaptive histogram equalization over a `grid` x `grid`
/// tiling, with bilinear interpolation between tile mappings.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn clahe(gray: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    // Every tile is non-empty; the last row and column may be narrower.
    let tile_w = w.div_ceil(grid.clamp(1, w));
    let tile_h = h.div_ceil(grid.clamp(1, h));
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tile_w, ty * tile_h);
            let (x1, y1) = ((x0 + tile_w).min(w), (y0 + tile_h).min(h));
            let area = (x1 - x0) * (y1 - y0);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            // Clip and spread the excess evenly
            let limit = (clip_limit * area as f32 / 256.0).max(1.0) as u32;
            let mut excess = 0;
            for bin in &mut histogram {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            let residual = excess % 256;
            for bin in &mut histogram {
                *bin += bonus;
            }
            if residual > 0 {
                let step = (256 / residual) as usize;
                for bin in histogram.iter_mut().step_by(step).take(residual as usize) {
                    *bin += 1;
                }
            }

            let mut lut = [0u8; 256];
            let mut acc = 0u32;
            for (value, bin) in histogram.iter().enumerate() {
                acc += bin;
                lut[value] = to_u8(acc as f32 * 255.0 / area as f32);
            }
            luts.push(lut);
        }
    }

    let lookup = |tx: u32, ty: u32, v: usize| f32::from(luts[(ty * tiles_x + tx) as usize][v]);
    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;

        // Position relative to tile centres
        let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (tiles_x - 1) as f32);
        let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (tiles_y - 1) as f32);
        let (tx0, ty0) = (fx.floor() as u32, fy.floor() as u32);
        let (tx1, ty1) = ((tx0 + 1).min(tiles_x - 1), (ty0 + 1).min(tiles_y - 1));
        let (ax, ay) = (fx - tx0 as f32, fy - ty0 as f32);

        let top = lookup(tx0, ty0, v) * (1.0 - ax) + lookup(tx1, ty0, v) * ax;
        let bottom = lookup(tx0, ty1, v) * (1.0 - ax) + lookup(tx1, ty1, v) * ax;
        Luma([to_u8(top * (1.0 - ay) + bottom * ay)])
    })
}

/// Histogram-equalize luma, keep chroma, then blur lightly.
fn equalize_and_smooth(image: &RgbImage) -> RgbImage {
    let (luma, chroma) = split_luma(image);
    let equalized = equalize_histogram(&luma);
    gaussian_blur_f32(&merge_luma(&equalized, &chroma), SMOOTHING_SIGMA)
}
