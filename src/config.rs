//! Configuration types for the photo editor

use crate::{
    error::{PhotoEditError, Result},
    models::ModelSpec,
    processor::BackendType,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Width of the eraser canvas; uploads are scaled to this width for drawing
pub const DEFAULT_DISPLAY_WIDTH: u32 = 350;
/// Smallest brush the slider offers
pub const MIN_BRUSH_SIZE: u32 = 1;
/// Largest brush the slider offers
pub const MAX_BRUSH_SIZE: u32 = 50;
/// Brush size the slider starts at
pub const DEFAULT_BRUSH_SIZE: u32 = 15;
/// Neighborhood radius handed to the inpainting routine
pub const DEFAULT_INPAINT_RADIUS: u32 = 3;
/// Quality used for the erased JPEG download
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
/// Tallest canvas an upload may be scaled to
pub const DEFAULT_MAX_DISPLAY_HEIGHT: u32 = 8192;

/// Execution provider options for the ONNX Runtime backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Use CUDA when available, otherwise CPU
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency)
    Jpeg,
}

/// Algorithm selector for the inpainting call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InpaintMethod {
    /// Fast marching method (Telea)
    #[default]
    Telea,
    /// Iterative isotropic diffusion
    Diffusion,
}

impl std::fmt::Display for InpaintMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telea => write!(f, "telea"),
            Self::Diffusion => write!(f, "diffusion"),
        }
    }
}

impl std::str::FromStr for InpaintMethod {
    type Err = PhotoEditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "telea" | "fmm" => Ok(Self::Telea),
            "diffusion" | "ns" => Ok(Self::Diffusion),
            other => Err(PhotoEditError::invalid_config(format!(
                "Unknown inpaint method: {other}. Supported: telea, diffusion"
            ))),
        }
    }
}

/// Color that transparent pixels are composited onto before inpainting
///
/// Inpainting works on three color channels only, so an uploaded image with
/// transparency has to be flattened first. Reconstructed pixels next to formerly
/// transparent areas pick up this color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backdrop {
    #[default]
    White,
    Black,
    /// Arbitrary RGB color
    Color([u8; 3]),
}

impl Backdrop {
    /// RGB components of the backdrop
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::White => [255, 255, 255],
            Self::Black => [0, 0, 0],
            Self::Color(rgb) => rgb,
        }
    }
}

impl std::str::FromStr for Backdrop {
    type Err = PhotoEditError;

    /// Parses `white`, `black` or a `#rrggbb` hex color
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            hex if hex.len() == 7 && hex.starts_with('#') => {
                let channel = |range: std::ops::Range<usize>| {
                    hex.get(range)
                        .and_then(|part| u8::from_str_radix(part, 16).ok())
                        .ok_or_else(|| {
                            PhotoEditError::invalid_config(format!("Invalid backdrop color: {s}"))
                        })
                };
                Ok(Self::Color([channel(1..3)?, channel(3..5)?, channel(5..7)?]))
            },
            _ => Err(PhotoEditError::invalid_config(format!(
                "Invalid backdrop: {s}. Use white, black or #rrggbb"
            ))),
        }
    }
}

/// Configuration for both editing flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Width the eraser flow scales uploads to
    pub display_width: u32,

    /// Uploads whose scaled height would exceed this are rejected
    pub max_display_height: u32,

    /// Initial brush size for the drawing surface
    pub default_brush_size: u32,

    /// Neighborhood radius for inpainting
    pub inpaint_radius: u32,

    /// Inpainting algorithm
    pub inpaint_method: InpaintMethod,

    /// Compositing color for transparent pixels before inpainting
    pub backdrop: Backdrop,

    /// JPEG quality for the erased download (1-100)
    pub jpeg_quality: u8,

    /// Segmentation backend
    pub backend_type: BackendType,

    /// Execution provider for the ONNX Runtime backend
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Segmentation model location and preprocessing parameters
    pub model_spec: ModelSpec,

    /// Enable debug mode (additional logging)
    pub debug: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            display_width: DEFAULT_DISPLAY_WIDTH,
            max_display_height: DEFAULT_MAX_DISPLAY_HEIGHT,
            default_brush_size: DEFAULT_BRUSH_SIZE,
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
            inpaint_method: InpaintMethod::default(),
            backdrop: Backdrop::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            model_spec: ModelSpec::default(),
            debug: false,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use magic_photo::{EditorConfig, InpaintMethod};
    ///
    /// let config = EditorConfig::builder()
    ///     .display_width(500)
    ///     .inpaint_method(InpaintMethod::Telea)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.display_width, 500);
    /// ```
    #[must_use]
    pub fn builder() -> EditorConfigBuilder {
        EditorConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults. The loaded configuration is validated.
    ///
    /// # Errors
    /// - The file cannot be read
    /// - The file is not valid JSON for this structure
    /// - A value is out of range
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PhotoEditError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            PhotoEditError::invalid_config(format!(
                "Failed to parse config file '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Per-user configuration file location, if the platform has a config directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("magic-photo").join("config.json"))
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - Display width: 1-8192
    /// - Maximum display height: 1-65536
    /// - Default brush size: 1-50
    /// - Inpaint radius: 1-50
    /// - JPEG quality: 1-100
    ///
    /// # Errors
    /// Returns `PhotoEditError::InvalidConfig` describing the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.display_width == 0 || self.display_width > 8192 {
            return Err(PhotoEditError::config_value_error(
                "display width",
                self.display_width,
                "1-8192",
                Some(DEFAULT_DISPLAY_WIDTH),
            ));
        }

        if self.max_display_height == 0 || self.max_display_height > 65_536 {
            return Err(PhotoEditError::config_value_error(
                "maximum display height",
                self.max_display_height,
                "1-65536",
                Some(DEFAULT_MAX_DISPLAY_HEIGHT),
            ));
        }

        if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&self.default_brush_size) {
            return Err(PhotoEditError::config_value_error(
                "brush size",
                self.default_brush_size,
                "1-50",
                Some(DEFAULT_BRUSH_SIZE),
            ));
        }

        if self.inpaint_radius == 0 || self.inpaint_radius > 50 {
            return Err(PhotoEditError::config_value_error(
                "inpaint radius",
                self.inpaint_radius,
                "1-50",
                Some(DEFAULT_INPAINT_RADIUS),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(PhotoEditError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "1-100",
                Some(DEFAULT_JPEG_QUALITY),
            ));
        }

        self.model_spec.preprocessing.validate()
    }
}

/// Builder for `EditorConfig`
#[derive(Debug, Default)]
pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from a file)
    #[must_use]
    pub fn from_config(config: EditorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn display_width(mut self, width: u32) -> Self {
        self.config.display_width = width;
        self
    }

    #[must_use]
    pub fn max_display_height(mut self, height: u32) -> Self {
        self.config.max_display_height = height;
        self
    }

    #[must_use]
    pub fn default_brush_size(mut self, size: u32) -> Self {
        self.config.default_brush_size = size;
        self
    }

    #[must_use]
    pub fn inpaint_radius(mut self, radius: u32) -> Self {
        self.config.inpaint_radius = radius;
        self
    }

    #[must_use]
    pub fn inpaint_method(mut self, method: InpaintMethod) -> Self {
        self.config.inpaint_method = method;
        self
    }

    #[must_use]
    pub fn backdrop(mut self, backdrop: Backdrop) -> Self {
        self.config.backdrop = backdrop;
        self
    }

    /// Set JPEG quality, clamped to 1-100
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Point the segmentation model at an ONNX file on disk
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_spec.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `PhotoEditError::InvalidConfig` when a value is out of range.
    pub fn build(self) -> Result<EditorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
