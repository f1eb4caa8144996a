//! Segmentation model input preparation
//!
//! Letterboxes an image into the model's input size and converts it to a
//! normalized NCHW tensor. The returned [`Letterbox`] describes where the
//! image landed so model output can be mapped back to source pixels.

use crate::{
    error::{PhotoEditError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
    /// Whether to return the preprocessed image for debugging
    pub return_preprocessed_image: bool,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
            return_preprocessed_image: false,
        }
    }
}

/// Placement of the resized image inside the model canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub source_width: u32,
    pub source_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Size of the resized image inside the canvas
    pub content_width: u32,
    pub content_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    /// Fit `source` inside `canvas` preserving aspect ratio, centered
    ///
    /// # Errors
    /// - Any dimension is zero
    pub fn fit(source: (u32, u32), canvas: (u32, u32)) -> Result<Self> {
        let (source_width, source_height) = source;
        let (canvas_width, canvas_height) = canvas;
        if source_width == 0 || source_height == 0 || canvas_width == 0 || canvas_height == 0 {
            return Err(PhotoEditError::invalid_config(format!(
                "Cannot letterbox {source_width}x{source_height} into {canvas_width}x{canvas_height}"
            )));
        }

        let scale = (canvas_width as f32 / source_width as f32)
            .min(canvas_height as f32 / source_height as f32);
        let content_width = ((source_width as f32 * scale).round() as u32).clamp(1, canvas_width);
        let content_height = ((source_height as f32 * scale).round() as u32).clamp(1, canvas_height);

        Ok(Self {
            source_width,
            source_height,
            canvas_width,
            canvas_height,
            content_width,
            content_height,
            offset_x: (canvas_width - content_width) / 2,
            offset_y: (canvas_height - content_height) / 2,
        })
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess image for model inference
    ///
    /// This function handles:
    /// - RGB conversion
    /// - Aspect ratio preserving resize
    /// - Center padding to target size
    /// - Normalization to tensor format (NCHW)
    ///
    /// # Errors
    /// - Zero sized image or target
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Option<DynamicImage>, Array4<f32>, Letterbox)> {
        let rgb_image = image.to_rgb8();
        let [target_width, target_height] = preprocessing_config.target_size;
        let letterbox = Letterbox::fit(rgb_image.dimensions(), (target_width, target_height))?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.content_width,
            letterbox.content_height,
            FilterType::Triangle,
        );

        let mut canvas = ImageBuffer::from_pixel(target_width, target_height, Rgb(options.padding_color));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config);

        let preprocessed_image = options
            .return_preprocessed_image
            .then(|| DynamicImage::ImageRgb8(canvas));

        Ok((preprocessed_image, tensor, letterbox))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] =
                    (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
            }
        }

        tensor
    }

    /// Tensor-only preprocessing used by the processor
    ///
    /// # Errors
    /// - Zero sized image or target
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox)> {
        let (_, tensor, letterbox) =
            Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())?;
        Ok((tensor, letterbox))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [size, size],
            ..PreprocessingConfig::default()
        }
    }

    #[test]
    fn test_letterbox_landscape() {
        let letterbox = Letterbox::fit((400, 300), (320, 320)).unwrap();
        assert_eq!((letterbox.content_width, letterbox.content_height), (320, 240));
        assert_eq!((letterbox.offset_x, letterbox.offset_y), (0, 40));
    }

    #[test]
    fn test_letterbox_portrait_and_tiny() {
        let letterbox = Letterbox::fit((100, 400), (320, 320)).unwrap();
        assert_eq!((letterbox.content_width, letterbox.content_height), (80, 320));
        assert_eq!(letterbox.offset_x, 120);

        let letterbox = Letterbox::fit((1, 1000), (320, 320)).unwrap();
        assert_eq!(letterbox.content_width, 1);
    }

    #[test]
    fn test_letterbox_rejects_zero() {
        assert!(Letterbox::fit((0, 10), (320, 320)).is_err());
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 0, 0])));
        let options = PreprocessingOptions {
            padding_color: [0, 255, 0],
            return_preprocessed_image: true,
        };

        let (canvas, tensor, letterbox) =
            ImagePreprocessor::preprocess_image(&image, &config(32), &options).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(letterbox.offset_y, 8);
        let canvas = canvas.unwrap().to_rgb8();
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(canvas.get_pixel(16, 16), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_normalization_values() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let config = PreprocessingConfig {
            target_size: [4, 4],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [0.5, 0.5, 0.5],
        };

        let (tensor, _) = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }
}
