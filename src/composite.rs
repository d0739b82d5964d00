//! Mask-driven pixel selection between images.

use image::{ImageBuffer, Pixel, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::prompt::Extent;

/// Merge `overlay` into `base` under `mask`.
///
/// The output takes the overlay pixel wherever the effective mask (`mask`,
/// or its complement when `invert` is set) is 255 and the base pixel
/// everywhere else. A mask of a different extent is resized with
/// nearest-neighbour sampling first; base and overlay must already agree.
pub fn compose<P>(
    base: &ImageBuffer<P, Vec<P::Subpixel>>,
    overlay: &ImageBuffer<P, Vec<P::Subpixel>>,
    mask: &Mask,
    invert: bool,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel,
{
    let extent = Extent::from(base.dimensions());
    if overlay.dimensions() != base.dimensions() {
        return Err(Error::mismatch(format!(
            "base is {extent} but overlay is {}",
            Extent::from(overlay.dimensions())
        )));
    }
    let mask = fit_mask(mask, extent)?;

    // Overlay wins wherever the effective mask is set
    let mut out = base.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.is_set(x, y) != invert {
            *pixel = *overlay.get_pixel(x, y);
        }
    }
    Ok(out)
}

/// RGBA image with colour from `image` and alpha equal to the mask.
pub fn alpha_cutout(image: &RgbImage, mask: &Mask) -> Result<RgbaImage> {
    let mask = fit_mask(mask, image.dimensions().into())?;
    Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Rgba([r, g, b, mask.as_gray().get_pixel(x, y)[0]])
    }))
}

/// Copy of `image` with every pixel outside the mask set to black.
pub fn black_cutout(image: &RgbImage, mask: &Mask) -> Result<RgbImage> {
    let black = RgbImage::from_pixel(image.width(), image.height(), Rgb([0, 0, 0]));
    compose(&black, image, mask, false)
}

fn fit_mask(mask: &Mask, extent: Extent) -> Result<std::borrow::Cow<'_, Mask>> {
    if extent.is_empty() {
        return Err(Error::mismatch(format!("cannot composite onto a {extent} image")));
    }
    if mask.extent() == extent {
        Ok(std::borrow::Cow::Borrowed(mask))
    } else {
        tracing::debug!("Resizing {} mask to {}", mask.extent(), extent);
        mask.resized(extent).map(std::borrow::Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gradient(w: u32, h: u32, seed: u8) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x as u8).wrapping_mul(7).wrapping_add(seed),
                (y as u8).wrapping_mul(13),
                seed,
            ])
        })
    }

    fn stripes(w: u32, h: u32) -> Mask {
        Mask::from_gray(GrayImage::from_fn(w, h, |x, y| {
            Luma([if (x / 2 + y) % 3 == 0 { 255 } else { 0 }])
        }))
    }

    #[test]
    fn empty_mask_keeps_base_or_takes_overlay() {
        let base = gradient(16, 9, 1);
        let styled = gradient(16, 9, 99);
        let empty = Mask::filled(Extent::new(16, 9), false);

        assert_eq!(compose(&base, &styled, &empty, false).unwrap(), base);
        assert_eq!(compose(&base, &styled, &empty, true).unwrap(), styled);
    }

    #[test]
    fn inverted_composites_partition_the_image() {
        let base = gradient(20, 12, 3);
        let styled = gradient(20, 12, 200);
        let mask = stripes(20, 12);

        let inside = compose(&base, &styled, &mask, false).unwrap();
        let outside = compose(&base, &styled, &mask, true).unwrap();

        for (x, y, p) in base.enumerate_pixels() {
            let changed_in = inside.get_pixel(x, y) != p;
            let changed_out = outside.get_pixel(x, y) != p;
            if mask.is_set(x, y) {
                assert_eq!(inside.get_pixel(x, y), styled.get_pixel(x, y));
                assert_eq!(outside.get_pixel(x, y), p);
                assert!(!changed_out);
            } else {
                assert_eq!(inside.get_pixel(x, y), p);
                assert_eq!(outside.get_pixel(x, y), styled.get_pixel(x, y));
                assert!(!changed_in);
            }
        }
    }

    #[test]
    fn mask_is_resized_to_image_extent() {
        let base = gradient(10, 10, 0);
        let styled = gradient(10, 10, 50);
        let mask = Mask::filled(Extent::new(3, 3), true);
        assert_eq!(compose(&base, &styled, &mask, false).unwrap(), styled);
    }

    #[test]
    fn image_extent_mismatch_is_rejected() {
        let base = gradient(10, 10, 0);
        let styled = gradient(10, 11, 0);
        let mask = Mask::filled(Extent::new(10, 10), true);
        let err = compose(&base, &styled, &mask, false).unwrap_err();
        assert!(matches!(err, Error::ResourceMismatch(_)));
    }

    #[test]
    fn zero_sized_images_are_rejected() {
        let empty = RgbImage::new(0, 0);
        let mask = Mask::filled(Extent::new(4, 4), true);
        assert!(compose(&empty, &empty, &mask, false).is_err());
    }

    #[test]
    fn cutouts_follow_the_mask() {
        let image = gradient(6, 4, 10);
        let mask = stripes(6, 4);

        let rgba = alpha_cutout(&image, &mask).unwrap();
        let black = black_cutout(&image, &mask).unwrap();
        for (x, y, p) in rgba.enumerate_pixels() {
            let src = image.get_pixel(x, y).0;
            assert_eq!(&p.0[..3], &src);
            if mask.is_set(x, y) {
                assert_eq!(p[3], 255);
                assert_eq!(black.get_pixel(x, y).0, src);
            } else {
                assert_eq!(p[3], 0);
                assert_eq!(black.get_pixel(x, y).0, [0, 0, 0]);
            }
        }
    }
}
