//! Mask-directed inpainting
//!
//! [`inpaint`] takes an RGB buffer, a co-sized mask (non-zero marks pixels to
//! reconstruct), a neighborhood radius and an [`InpaintMethod`] selector, and
//! returns a new buffer of the same size. Unmarked pixels are copied through
//! unchanged.
//!
//! `Telea` runs the fast marching method of the `inpaint` crate. `Diffusion`
//! is a smoother, lower quality fill that crate does not provide.
//!
//! ```rust
//! use image::{GrayImage, Luma, Rgb, RgbImage};
//! use magic_photo::{inpaint::InpaintExt, InpaintMethod};
//!
//! let image = RgbImage::from_pixel(16, 16, Rgb([30, 60, 90]));
//! let mut mask = GrayImage::new(16, 16);
//! mask.put_pixel(8, 8, Luma([255]));
//!
//! let restored = image.inpaint_masked(&mask, 3, InpaintMethod::Telea).unwrap();
//! let pixel = restored.get_pixel(8, 8);
//! assert!(pixel.0.iter().zip([30, 60, 90]).all(|(&v, e)| v.abs_diff(e) <= 1));
//! ```

mod diffusion;

use crate::{
    config::InpaintMethod,
    error::{PhotoEditError, Result},
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::instrument;

/// Row-major pixel addressing with bounds checks
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grid {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Grid {
    fn index(self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            None
        } else {
            Some(y as usize * self.width as usize + x as usize)
        }
    }

    fn coords(self, index: usize) -> (i64, i64) {
        let width = self.width as usize;
        ((index % width) as i64, (index / width) as i64)
    }
}

/// Reconstruct the marked pixels of `image`
///
/// An all-zero mask returns an unchanged copy.
///
/// # Errors
/// - `DimensionMismatch` when mask and image sizes differ
/// - `InvalidConfig` for a zero radius
/// - `Inpainting` when every pixel is marked or the fast marching call fails
#[instrument(skip(image, mask), fields(width = image.width(), height = image.height()))]
pub fn inpaint(image: &RgbImage, mask: &GrayImage, radius: u32, method: InpaintMethod) -> Result<RgbImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(PhotoEditError::dimension_mismatch(
            image.dimensions(),
            mask.dimensions(),
        ));
    }
    if radius == 0 {
        return Err(PhotoEditError::config_value_error(
            "inpaint radius",
            radius,
            "1-50",
            Some(crate::config::DEFAULT_INPAINT_RADIUS),
        ));
    }

    let marked: Vec<bool> = mask.as_raw().iter().map(|&v| v != 0).collect();
    let marked_count = marked.iter().filter(|&&m| m).count();
    if marked_count == 0 {
        return Ok(image.clone());
    }
    if marked_count == marked.len() {
        return Err(PhotoEditError::inpainting(
            "Mask covers the whole image; no known pixels to reconstruct from",
        ));
    }
    tracing::debug!(marked_count, %method, radius, "Inpainting");

    let filled = match method {
        InpaintMethod::Telea => fast_marching(image, &marked, radius)?,
        InpaintMethod::Diffusion => diffuse(image, &marked, radius)?,
    };

    // Only marked pixels are taken from the reconstruction
    let mut output = image.clone();
    for ((pixel, value), &is_marked) in output.pixels_mut().zip(filled.pixels()).zip(&marked) {
        if is_marked {
            *pixel = *value;
        }
    }
    Ok(output)
}

fn fast_marching(image: &RgbImage, marked: &[bool], radius: u32) -> Result<RgbImage> {
    use ::inpaint::prelude::*;

    let (width, height) = image.dimensions();
    let mask = GrayImage::from_fn(width, height, |x, y| {
        let index = y as usize * width as usize + x as usize;
        Luma([if marked[index] { 255 } else { 0 }])
    });

    let mut restored = image.clone();
    restored
        .telea_inpaint(
            &mask,
            radius.try_into().map_err(|_| {
                PhotoEditError::invalid_config(format!("Inpaint radius {radius} is too large"))
            })?,
        )
        .map_err(|e| PhotoEditError::inpainting(format!("Fast marching failed: {e:?}")))?;
    Ok(restored)
}

fn diffuse(image: &RgbImage, marked: &[bool], radius: u32) -> Result<RgbImage> {
    let grid = Grid {
        width: image.width(),
        height: image.height(),
    };
    let mut pixels: Vec<[f32; 3]> = image
        .pixels()
        .map(|p| p.0.map(f32::from))
        .collect();

    diffusion::inpaint(&grid, &mut pixels, marked, radius)?;

    let mut output = image.clone();
    for (pixel, value) in output.pixels_mut().zip(&pixels) {
        *pixel = Rgb(value.map(|v| v.round().clamp(0.0, 255.0) as u8));
    }
    Ok(output)
}

/// Extension method for inpainting RGB buffers directly
pub trait InpaintExt {
    /// Inpaint with the given method
    ///
    /// # Errors
    /// Same as [`inpaint`].
    fn inpaint_masked(&self, mask: &GrayImage, radius: u32, method: InpaintMethod) -> Result<RgbImage>;
}

impl InpaintExt for RgbImage {
    fn inpaint_masked(&self, mask: &GrayImage, radius: u32, method: InpaintMethod) -> Result<RgbImage> {
        inpaint(self, mask, radius, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Vertical stripes with a square hole punched through the middle
    fn striped_with_hole() -> (RgbImage, GrayImage) {
        let image = RgbImage::from_fn(40, 30, |x, _| {
            if x < 20 {
                Rgb([200, 40, 40])
            } else {
                Rgb([40, 40, 200])
            }
        });
        let mut mask = GrayImage::new(40, 30);
        for y in 10..20 {
            for x in 15..25 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        (image, mask)
    }

    fn max_difference(a: &RgbImage, b: &RgbImage) -> u8 {
        a.as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_grid_addressing() {
        let grid = Grid { width: 4, height: 3 };
        assert_eq!(grid.index(0, 0), Some(0));
        assert_eq!(grid.index(3, 2), Some(11));
        assert_eq!(grid.index(4, 0), None);
        assert_eq!(grid.index(-1, 0), None);
        assert_eq!(grid.coords(6), (2, 1));
    }

    #[test]
    fn test_unmarked_pixels_are_bit_exact() {
        let (image, mask) = striped_with_hole();
        for method in [InpaintMethod::Telea, InpaintMethod::Diffusion] {
            let output = inpaint(&image, &mask, 3, method).unwrap();
            assert_eq!(output.dimensions(), image.dimensions());
            for (x, y, pixel) in output.enumerate_pixels() {
                if mask.get_pixel(x, y)[0] == 0 {
                    assert_eq!(pixel, image.get_pixel(x, y), "{method} changed ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn test_hole_edges_follow_surroundings() {
        let (image, mask) = striped_with_hole();
        for method in [InpaintMethod::Telea, InpaintMethod::Diffusion] {
            let output = inpaint(&image, &mask, 3, method).unwrap();
            // Far left and far right columns of the hole lean toward their side's color
            let left = output.get_pixel(15, 15);
            let right = output.get_pixel(24, 15);
            assert!(left[0] > left[2], "{method}: left {left:?}");
            assert!(right[2] > right[0], "{method}: right {right:?}");
        }
    }

    #[test]
    fn test_uniform_image_is_restored_exactly() {
        let image = RgbImage::from_pixel(20, 20, Rgb([17, 99, 230]));
        let mut damaged = image.clone();
        let mut mask = GrayImage::new(20, 20);
        for y in 5..12 {
            for x in 6..14 {
                mask.put_pixel(x, y, Luma([1]));
                damaged.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        for method in [InpaintMethod::Telea, InpaintMethod::Diffusion] {
            let restored = damaged.inpaint_masked(&mask, 3, method).unwrap();
            assert!(max_difference(&restored, &image) <= 1, "{method}");
        }
    }

    #[test]
    fn test_empty_mask_returns_copy() {
        let (image, _) = striped_with_hole();
        let output = inpaint(&image, &GrayImage::new(40, 30), 3, InpaintMethod::Telea).unwrap();
        assert_eq!(output, image);
    }

    #[test]
    fn test_contract_violations() {
        let (image, mask) = striped_with_hole();

        let err = inpaint(&image, &GrayImage::new(40, 29), 3, InpaintMethod::Telea).unwrap_err();
        assert!(matches!(err, PhotoEditError::DimensionMismatch { .. }));

        let err = inpaint(&image, &mask, 0, InpaintMethod::Telea).unwrap_err();
        assert!(matches!(err, PhotoEditError::InvalidConfig(_)));

        let full = GrayImage::from_pixel(40, 30, Luma([255]));
        for method in [InpaintMethod::Telea, InpaintMethod::Diffusion] {
            let err = inpaint(&image, &full, 3, method).unwrap_err();
            assert!(matches!(err, PhotoEditError::Inpainting(_)));
        }
    }

    #[test]
    fn test_hole_touching_border() {
        let image = RgbImage::from_pixel(10, 10, Rgb([5, 5, 5]));
        let mut mask = GrayImage::new(10, 10);
        for x in 0..10 {
            mask.put_pixel(x, 0, Luma([255]));
        }
        mask.put_pixel(0, 1, Luma([255]));

        let output = inpaint(&image, &mask, 3, InpaintMethod::Telea).unwrap();
        assert!(max_difference(&output, &image) <= 1);
    }
}
