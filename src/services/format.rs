//! Output format handling service
//!
//! Encoding of result images into download artifacts, kept apart from the
//! editing logic so both flows share one place that knows about codecs.

use crate::{
    config::OutputFormat,
    error::Result,
    types::Artifact,
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Download name of the background removal result
pub const BACKGROUND_REMOVED_FILE_NAME: &str = "no_bg.png";
/// Download name of the erased photo
pub const ERASED_FILE_NAME: &str = "erased_photo.jpg";

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Get the appropriate file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use magic_photo::{services::OutputFormatHandler, config::OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// MIME type announced with the download
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Encode an image into bytes of the given format
    ///
    /// PNG keeps the color type of the image (RGBA stays RGBA). JPEG drops any
    /// alpha channel and encodes RGB at `quality`.
    ///
    /// # Errors
    /// - The codec rejects the image
    pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Png => {
                image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
                encoder.encode_image(&rgb_image)?;
            },
        }
        Ok(buffer)
    }

    /// Encode an image and wrap it as a named download
    ///
    /// # Errors
    /// - The codec rejects the image
    pub fn to_artifact(
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
        file_name: &str,
    ) -> Result<Artifact> {
        if !Self::supports_transparency(format) && image.color().has_alpha() {
            log::debug!("Dropping alpha channel while encoding {file_name}");
        }
        let bytes = Self::encode(image, format, quality)?;
        Ok(Artifact::new(bytes, file_name, Self::mime_type(format)))
    }
}
