//! Core types shared by the background removal and eraser flows

use crate::error::{PhotoEditError, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, ImageFormat, RgbImage, Rgba};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A decoded upload, never modified after decoding
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    /// Name of the uploaded file as the user provided it
    pub file_name: String,
    /// Size of the uploaded bytes
    pub byte_size: usize,
    pub format: ImageFormat,
}

impl SourceImage {
    #[must_use]
    pub fn new(image: DynamicImage, file_name: String, byte_size: usize, format: ImageFormat) -> Self {
        Self {
            image,
            file_name,
            byte_size,
            format,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether the decoded image carries an alpha channel
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// Identity of this upload for binding a drawing surface
    ///
    /// Derived from the file name and byte size, so re-uploading a different
    /// file always yields a different key, while re-rendering the same upload
    /// keeps it.
    #[must_use]
    pub fn identity_key(&self) -> String {
        surface_key(&self.file_name, self.byte_size)
    }
}

/// Hex digest of `name` and `size`, truncated to 16 characters
#[must_use]
pub fn surface_key(name: &str, size: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(size.to_le_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// RGB copy of a source image scaled to the display width
#[derive(Debug, Clone)]
pub struct DisplayImage {
    pub image: RgbImage,
    /// Dimensions of the source image before resizing
    pub source_dimensions: (u32, u32),
}

impl DisplayImage {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Single channel mask of user-marked pixels; 0 is unmarked, anything else is marked
#[derive(Debug, Clone, PartialEq)]
pub struct PaintMask {
    mask: GrayImage,
}

impl PaintMask {
    /// A mask with no marked pixel
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_image(mask: GrayImage) -> Self {
        Self { mask }
    }

    /// Binarize a grayscale image (e.g. a loaded mask file): non-zero becomes 255
    #[must_use]
    pub fn from_gray_thresholded(image: &GrayImage) -> Self {
        let mut mask = image.clone();
        for pixel in mask.pixels_mut() {
            if pixel[0] != 0 {
                pixel[0] = 255;
            }
        }
        Self { mask }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.mask
    }

    /// Number of marked pixels
    #[must_use]
    pub fn marked_pixels(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v != 0).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.mask.as_raw().iter().any(|&v| v != 0)
    }

    /// Check that this mask can be paired with an image of the given size
    ///
    /// # Errors
    /// Returns `PhotoEditError::DimensionMismatch` when the sizes differ.
    pub fn ensure_matches(&self, image_dimensions: (u32, u32)) -> Result<()> {
        if self.dimensions() == image_dimensions {
            Ok(())
        } else {
            Err(PhotoEditError::dimension_mismatch(
                image_dimensions,
                self.dimensions(),
            ))
        }
    }
}

/// Encoded bytes offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl Artifact {
    #[must_use]
    pub fn new(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> Self {
        Self {
            bytes,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    /// Write the artifact bytes to `path`
    ///
    /// # Errors
    /// - Parent directory missing or not writable
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)
            .map_err(|e| PhotoEditError::file_io_error("write artifact", path, &e))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Output of either flow: the image shown to the user and its download artifact
#[derive(Debug, Clone)]
pub struct EditResult {
    pub image: DynamicImage,
    pub artifact: Artifact,
    /// Segmentation mask, present for background removal only
    pub mask: Option<SegmentationMask>,
    pub metadata: ProcessingMetadata,
}

impl EditResult {
    #[must_use]
    pub fn new(image: DynamicImage, artifact: Artifact, metadata: ProcessingMetadata) -> Self {
        Self {
            image,
            artifact,
            mask: None,
            metadata,
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: SegmentationMask) -> Self {
        self.mask = Some(mask);
        self
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Write the download artifact to `path`
    ///
    /// # Errors
    /// - File cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.artifact.save(path)
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        let mut parts = vec![format!("Total: {}ms", t.total_ms)];
        let phases = [
            ("Decode", t.image_decode_ms),
            ("Preprocess", t.preprocessing_ms),
            ("Inference", t.inference_ms),
            ("Postprocess", t.postprocessing_ms),
            ("Inpaint", t.inpainting_ms),
            ("Encode", t.image_encode_ms),
        ];
        for (label, ms) in phases {
            if ms > 0 {
                parts.push(format!("{label}: {ms}ms"));
            }
        }
        parts.join(" | ")
    }
}

/// Foreground probability mask from the segmentation model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Alpha values (0-255), row major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| PhotoEditError::internal("Failed to create image from mask data"))
    }

    /// Write the mask values into the alpha channel of `image`
    ///
    /// Pixels that end up fully transparent are zeroed so no color leaks from
    /// the removed background.
    ///
    /// # Errors
    /// - Image and mask sizes differ
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(PhotoEditError::dimension_mismatch(
                image.dimensions(),
                self.dimensions,
            ));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(&self.data) {
            if alpha == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                pixel[3] = alpha;
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Per-phase timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub image_decode_ms: u64,
    /// Resize, normalization and tensor conversion
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    /// Mask generation and alpha application
    pub postprocessing_ms: u64,
    pub inpainting_ms: u64,
    pub image_encode_ms: u64,
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Time not attributed to any measured phase
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.image_decode_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.postprocessing_ms
            + self.inpainting_ms
            + self.image_encode_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub timings: ProcessingTimings,
    /// `background_removal` or `erase`
    pub operation: String,
    /// Segmentation model or inpainting method used
    pub engine: String,
    pub input_format: String,
    pub output_format: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(operation: &str, engine: &str) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            operation: operation.to_string(),
            engine: engine.to_string(),
            input_format: "unknown".to_string(),
            output_format: "unknown".to_string(),
            created_at: Utc::now(),
        }
    }
}
