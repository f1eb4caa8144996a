//! Error types for photo editing operations

use thiserror::Error;

/// Result type alias for photo editing operations
pub type Result<T> = std::result::Result<T, PhotoEditError>;

/// Comprehensive error types for background removal and object erasing
#[derive(Error, Debug)]
pub enum PhotoEditError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors reported by the codec
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Uploaded bytes could not be decoded as a raster image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Upload is not one of the accepted formats
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Segmentation backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Inpainting failures
    #[error("Inpainting error: {0}")]
    Inpainting(String),

    /// Erase was requested while the paint mask has no marked pixel
    #[error("Nothing to erase: the paint mask is empty")]
    EmptyMask,

    /// A mask was paired with an image buffer of a different size
    #[error("Dimension mismatch: image is {image_width}x{image_height} but mask is {mask_width}x{mask_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used when reporting failures to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable or unsupported uploaded file
    Decode,
    /// Segmentation or inpainting routine failed
    ExternalCall,
    /// The action's precondition does not hold (e.g. empty mask)
    Precondition,
    /// Configuration, I/O and everything else
    Other,
}

impl PhotoEditError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inpainting error
    pub fn inpainting<S: Into<String>>(msg: S) -> Self {
        Self::Inpainting(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a dimension mismatch error from an image and a mask size
    #[must_use]
    pub fn dimension_mismatch(image: (u32, u32), mask: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            image_width: image.0,
            image_height: image.1,
            mask_width: mask.0,
            mask_height: mask.1,
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Classify the error along the decode / external call / precondition split
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) | Self::UnsupportedFormat(_) | Self::Image(_) => ErrorKind::Decode,
            Self::Inference(_) | Self::Model(_) | Self::Inpainting(_) => ErrorKind::ExternalCall,
            Self::EmptyMask | Self::DimensionMismatch { .. } => ErrorKind::Precondition,
            Self::Io(_) | Self::InvalidConfig(_) | Self::Internal(_) => ErrorKind::Other,
        }
    }
}
