//! Display resizing for the eraser canvas

use crate::{
    config::Backdrop,
    error::{PhotoEditError, Result},
    types::{DisplayImage, SourceImage},
    utils::flatten_alpha,
};
use image::{imageops::FilterType, RgbImage};

/// Height that keeps the aspect ratio at `display_width`
///
/// `round(height * display_width / width)`, never less than 1.
///
/// # Errors
/// - Zero width, zero height or zero display width
pub fn display_height(source: (u32, u32), display_width: u32) -> Result<u32> {
    let (width, height) = source;
    if width == 0 || height == 0 {
        return Err(PhotoEditError::decode(format!("Image has zero area: {width}x{height}")));
    }
    if display_width == 0 {
        return Err(PhotoEditError::invalid_config("Display width must be positive"));
    }

    // Integer rounding: (2*h*W + w) / (2*w) == round(h*W/w) with ties up
    let numerator = 2 * u64::from(height) * u64::from(display_width) + u64::from(width);
    let scaled = numerator / (2 * u64::from(width));
    let scaled = u32::try_from(scaled)
        .map_err(|_| PhotoEditError::invalid_config(format!("Display height overflows for {width}x{height}")))?;
    Ok(scaled.max(1))
}

/// Resize an RGB buffer to `display_width`, aspect preserved, Lanczos3
///
/// # Errors
/// - Zero sized input or display width
pub fn resize_for_display(image: &RgbImage, display_width: u32) -> Result<RgbImage> {
    let height = display_height(image.dimensions(), display_width)?;
    if image.dimensions() == (display_width, height) {
        return Ok(image.clone());
    }
    Ok(image::imageops::resize(
        image,
        display_width,
        height,
        FilterType::Lanczos3,
    ))
}

/// Build the eraser's working image from an upload
///
/// Transparent regions are composited onto `backdrop` before resizing.
///
/// # Errors
/// - Zero sized upload or display width
/// - `Decode` when the scaled height exceeds `max_height`
pub fn prepare_display_image(
    source: &SourceImage,
    display_width: u32,
    max_height: u32,
    backdrop: Backdrop,
) -> Result<DisplayImage> {
    let (width, height) = source.dimensions();
    let scaled_height = display_height((width, height), display_width)?;
    if scaled_height > max_height {
        return Err(PhotoEditError::decode(format!(
            "{} is too tall to edit: {width}x{height} scales to {display_width}x{scaled_height} (limit {max_height} px)",
            source.file_name
        )));
    }

    let rgb = flatten_alpha(&source.image, backdrop);
    let image = resize_for_display(&rgb, display_width)?;
    log::debug!(
        "Display image for {}: {}x{} -> {}x{}",
        source.file_name,
        rgb.width(),
        rgb.height(),
        image.width(),
        image.height()
    );
    Ok(DisplayImage {
        image,
        source_dimensions: source.dimensions(),
    })
}
