//! Magic eraser: reconstruct painted regions of the display image

use crate::{
    config::{EditorConfig, InpaintMethod, OutputFormat},
    error::{PhotoEditError, Result},
    inpaint,
    services::{OutputFormatHandler, ERASED_FILE_NAME},
    types::{DisplayImage, EditResult, PaintMask, ProcessingMetadata},
};
use image::DynamicImage;
use instant::Instant;
use tracing::{info, instrument};

/// Runs inpainting over a painted mask and packages the JPEG download
#[derive(Debug, Clone)]
pub struct ObjectEraser {
    radius: u32,
    method: InpaintMethod,
    jpeg_quality: u8,
}

impl ObjectEraser {
    #[must_use]
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            radius: config.inpaint_radius,
            method: config.inpaint_method,
            jpeg_quality: config.jpeg_quality,
        }
    }

    #[must_use]
    pub fn method(&self) -> InpaintMethod {
        self.method
    }

    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Erase the marked region of `display`
    ///
    /// The display image itself is never modified, so the same input can be
    /// erased again with a different mask.
    ///
    /// # Errors
    /// - `EmptyMask` when nothing is painted
    /// - `DimensionMismatch` when the mask does not match the display image
    /// - Inpainting or JPEG encoding failures
    #[instrument(skip_all, fields(method = %self.method, radius = self.radius))]
    pub fn erase(&self, display: &DisplayImage, mask: &PaintMask) -> Result<EditResult> {
        if mask.is_empty() {
            return Err(PhotoEditError::EmptyMask);
        }
        mask.ensure_matches(display.dimensions())?;

        let total_start = Instant::now();
        let inpaint_start = Instant::now();
        let restored = inpaint::inpaint(&display.image, mask.as_image(), self.radius, self.method)?;
        let inpainting_ms = inpaint_start.elapsed().as_millis() as u64;

        let restored = DynamicImage::ImageRgb8(restored);
        let encode_start = Instant::now();
        let artifact = OutputFormatHandler::to_artifact(
            &restored,
            OutputFormat::Jpeg,
            self.jpeg_quality,
            ERASED_FILE_NAME,
        )?;
        let image_encode_ms = encode_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new("erase", &self.method.to_string());
        metadata.input_format = "rgb8".to_string();
        metadata.output_format = "jpeg".to_string();
        metadata.timings.inpainting_ms = inpainting_ms;
        metadata.timings.image_encode_ms = image_encode_ms;
        metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            marked = mask.marked_pixels(),
            inpainting_ms, "Erased painted region"
        );

        Ok(EditResult::new(restored, artifact, metadata))
    }
}

impl Default for ObjectEraser {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    fn display(width: u32, height: u32) -> DisplayImage {
        DisplayImage {
            image: RgbImage::from_pixel(width, height, Rgb([40, 120, 200])),
            source_dimensions: (width, height),
        }
    }

    #[test]
    fn test_empty_mask_is_rejected() {
        let eraser = ObjectEraser::default();
        let err = eraser.erase(&display(20, 10), &PaintMask::empty(20, 10)).unwrap_err();
        assert!(matches!(err, PhotoEditError::EmptyMask));
    }

    #[test]
    fn test_mismatched_mask_is_rejected() {
        let eraser = ObjectEraser::default();
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(2, 2, Luma([255]));
        let err = eraser
            .erase(&display(20, 10), &PaintMask::from_image(mask))
            .unwrap_err();
        assert!(matches!(err, PhotoEditError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_erase_produces_jpeg_of_display_size() {
        let mut image = RgbImage::from_pixel(40, 30, Rgb([40, 120, 200]));
        for y in 10..20 {
            for x in 15..25 {
                image.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let display = DisplayImage {
            image,
            source_dimensions: (400, 300),
        };
        let mut mask = GrayImage::new(40, 30);
        for y in 8..22 {
            for x in 13..27 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let result = ObjectEraser::default()
            .erase(&display, &PaintMask::from_image(mask))
            .unwrap();

        assert_eq!(result.dimensions(), (40, 30));
        assert_eq!(result.artifact.file_name, "erased_photo.jpg");
        assert_eq!(result.artifact.mime_type, "image/jpeg");
        assert_eq!(
            image::guess_format(&result.artifact.bytes).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(result.metadata.operation, "erase");

        // The red patch is gone from the lossless result
        let restored = result.image.to_rgb8();
        assert_eq!(restored.get_pixel(20, 15), &Rgb([40, 120, 200]));
        let decoded = image::load_from_memory(&result.artifact.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }
}
