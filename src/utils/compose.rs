//! Alpha compositing helpers

use crate::config::Backdrop;
use image::{DynamicImage, Rgb, RgbImage};

/// Flatten an image to RGB, blending any alpha channel over `backdrop`
///
/// Images without alpha are converted directly so their pixels stay exact.
#[must_use]
pub fn flatten_alpha(image: &DynamicImage, backdrop: Backdrop) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let background = backdrop.rgb();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());

    for (out, pixel) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(pixel[3]);
        let blend = |fg: u8, bg: u8| -> u8 {
            ((u32::from(fg) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        *out = Rgb([
            blend(pixel[0], background[0]),
            blend(pixel[1], background[1]),
            blend(pixel[2], background[2]),
        ]);
    }

    rgb
}
