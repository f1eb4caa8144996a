//! Background removal processor
//!
//! Runs the upload-and-segment flow: preprocess an image into the model's
//! letterboxed input, run the segmentation backend, map its prediction back to
//! source pixels and write it into the alpha channel of an RGBA cut-out.

use crate::{
    config::{EditorConfig, OutputFormat},
    error::{PhotoEditError, Result},
    inference::InferenceBackend,
    services::{ImageIOService, OutputFormatHandler, BACKGROUND_REMOVED_FILE_NAME},
    types::{EditResult, ProcessingMetadata, ProcessingTimings, SegmentationMask, SourceImage},
    utils::{ImagePreprocessor, Letterbox},
};
use image::{DynamicImage, GenericImageView, RgbaImage};
use instant::Instant;
use log::{debug, info};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info as trace_info, instrument, span, Level};

/// Spread below which a prediction is treated as constant
const MIN_PREDICTION_RANGE: f32 = 1e-6;

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    #[default]
    Tract,
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Synthetic center-weighted mask, no model needed
    Mock,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tract => "tract",
            Self::Onnx => "onnx",
            Self::Mock => "mock",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendType {
    type Err = PhotoEditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            "mock" => Ok(Self::Mock),
            other => Err(PhotoEditError::invalid_config(format!(
                "Unknown backend '{other}'. Supported backends: tract, onnx, mock"
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type
    ///
    /// # Errors
    /// - The backend was not compiled into this build
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the backends compiled into this build
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
            BackendType::Mock => Ok(Box::new(crate::backends::MockBackend::new())),
            #[allow(unreachable_patterns)]
            other => Err(PhotoEditError::invalid_config(format!(
                "Backend '{other}' is not enabled in this build (enable the '{other}' feature)"
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends.push(BackendType::Mock);
        backends
    }
}

/// Background removal processor
pub struct BackgroundRemovalProcessor {
    config: EditorConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    initialized: bool,
}

impl BackgroundRemovalProcessor {
    /// Create a new processor with the default backend factory
    ///
    /// The backend is created and its model loaded lazily on first use.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: EditorConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a new processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(config: EditorConfig, backend_factory: Box<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: None,
            initialized: false,
        })
    }

    /// Create a processor around an already constructed backend
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(config: EditorConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        let mut processor = Self::new(config)?;
        processor.backend = Some(backend);
        Ok(processor)
    }

    /// Initialize the backend and load the segmentation model
    ///
    /// # Errors
    /// - The backend is not available in this build
    /// - Model missing or rejected by the runtime
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!("Initializing background removal processor");
        debug!("Backend type: {}", self.config.backend_type);
        debug!("Model: {}", self.config.model_spec.display_name());

        let mut backend = match self.backend.take() {
            Some(backend) => backend,
            None => self.backend_factory.create_backend(self.config.backend_type)?,
        };

        let load_time = match backend.initialize(&self.config) {
            Ok(load_time) => load_time,
            Err(e) => {
                // Keep an injected backend so a later call can retry it
                self.backend = Some(backend);
                return Err(e);
            },
        };
        match load_time {
            Some(load_time) => info!(
                "Segmentation backend {} ready, model loaded in {}ms",
                backend.name(),
                load_time.as_millis()
            ),
            None => info!("Segmentation backend {} ready", backend.name()),
        }

        self.backend = Some(backend);
        self.initialized = true;
        Ok(())
    }

    /// Run background removal on a decoded upload
    ///
    /// # Errors
    /// - Backend initialization or inference failures
    /// - PNG encoding failures
    #[instrument(
        skip(self, source),
        fields(
            backend = %self.config.backend_type,
            file = %source.file_name,
            dimensions = %format!("{}x{}", source.image.width(), source.image.height())
        )
    )]
    pub fn process_source(&mut self, source: &SourceImage) -> Result<EditResult> {
        let mut result = self.process_image(&source.image)?;
        result.metadata.input_format = format!("{:?}", source.format).to_lowercase();
        Ok(result)
    }

    /// Run background removal on an in-memory image
    ///
    /// # Errors
    /// - Backend initialization or inference failures
    /// - PNG encoding failures
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<EditResult> {
        self.initialize()?;

        let mut timings = ProcessingTimings::default();
        let total_start = Instant::now();
        let dimensions = image.dimensions();

        trace_info!(backend = %self.config.backend_type, "Starting background removal");

        let (input_tensor, letterbox) = {
            let _span = span!(
                Level::DEBUG,
                "preprocessing",
                width = %dimensions.0,
                height = %dimensions.1
            )
            .entered();
            self.preprocess(image, &mut timings)?
        };

        let output_tensor = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type).entered();
            self.perform_inference(&input_tensor, &mut timings)?
        };

        let (mask, cutout) = {
            let _span = span!(Level::DEBUG, "postprocessing").entered();
            let postprocess_start = Instant::now();
            let mask = Self::tensor_to_mask(&output_tensor, &letterbox)?;
            let mut cutout: RgbaImage = image.to_rgba8();
            mask.apply_to_image(&mut cutout)?;
            timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;
            (mask, DynamicImage::ImageRgba8(cutout))
        };

        let encode_start = Instant::now();
        let artifact = OutputFormatHandler::to_artifact(
            &cutout,
            OutputFormat::Png,
            100,
            BACKGROUND_REMOVED_FILE_NAME,
        )?;
        timings.image_encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let engine = self
            .backend
            .as_ref()
            .map_or_else(|| self.config.backend_type.to_string(), |backend| backend.name());
        let mut metadata = ProcessingMetadata::new("background_removal", &engine);
        metadata.output_format = "png".to_string();
        metadata.timings = timings;

        let stats = mask.statistics();
        info!(
            "Background removed: {:.1}% foreground, {}ms total",
            stats.foreground_ratio * 100.0,
            metadata.timings.total_ms
        );

        Ok(EditResult::new(cutout, artifact, metadata).with_mask(mask))
    }

    /// Decode uploaded bytes and run background removal
    ///
    /// # Errors
    /// - The bytes are not a PNG or JPEG image
    /// - Backend or encoding failures
    pub fn process_bytes(&mut self, image_bytes: &[u8], file_name: &str) -> Result<EditResult> {
        let decode_start = Instant::now();
        let source = ImageIOService::decode_upload(image_bytes, file_name)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_source(&source)?;
        result.metadata.timings.image_decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Read an image file and run background removal
    ///
    /// # Errors
    /// - The file cannot be read or decoded
    /// - Backend or encoding failures
    pub async fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<EditResult> {
        let decode_start = Instant::now();
        let source = ImageIOService::load_upload_async(input_path).await?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_source(&source)?;
        result.metadata.timings.image_decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        Ok(result)
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Get available backends from the factory
    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }

    fn preprocess(
        &self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<(Array4<f32>, Letterbox)> {
        let preprocess_start = Instant::now();
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| PhotoEditError::internal("Backend not initialized"))?;

        let preprocessing_config = backend.get_preprocessing_config()?;
        let prepared = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;

        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;
        Ok(prepared)
    }

    fn perform_inference(
        &mut self,
        input_tensor: &Array4<f32>,
        timings: &mut ProcessingTimings,
    ) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| PhotoEditError::internal("Backend not initialized"))?;

        let output_tensor = backend.infer(input_tensor)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;
        Ok(output_tensor)
    }

    /// Map a `[1, 1, H, W]` prediction back to source pixels
    ///
    /// Predictions are min-max normalized over the whole map first. A constant
    /// map is clamped to 0..=1 instead.
    fn tensor_to_mask(tensor: &Array4<f32>, letterbox: &Letterbox) -> Result<SegmentationMask> {
        let (batch, channels, out_height, out_width) = tensor.dim();
        if batch != 1 || channels != 1 || out_height == 0 || out_width == 0 {
            return Err(PhotoEditError::inference(format!(
                "Invalid output tensor shape {:?}, expected [1, 1, H, W]",
                tensor.shape()
            )));
        }

        let (min, max) = tensor
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !min.is_finite() || !max.is_finite() {
            return Err(PhotoEditError::inference("Output tensor contains non-finite values"));
        }
        let range = max - min;
        let normalize = |value: f32| {
            if range < MIN_PREDICTION_RANGE {
                value.clamp(0.0, 1.0)
            } else {
                (value - min) / range
            }
        };

        // The output may be produced at a different resolution than the input canvas
        let scale_x = out_width as f32 / letterbox.canvas_width as f32;
        let scale_y = out_height as f32 / letterbox.canvas_height as f32;
        let step_x = letterbox.content_width as f32 / letterbox.source_width as f32;
        let step_y = letterbox.content_height as f32 / letterbox.source_height as f32;

        let column_index: Vec<usize> = (0..letterbox.source_width)
            .map(|x| {
                let canvas_x = letterbox.offset_x as f32 + (x as f32 + 0.5) * step_x;
                ((canvas_x * scale_x) as usize).min(out_width - 1)
            })
            .collect();

        let mut data = Vec::with_capacity((letterbox.source_width * letterbox.source_height) as usize);
        for y in 0..letterbox.source_height {
            let canvas_y = letterbox.offset_y as f32 + (y as f32 + 0.5) * step_y;
            let row = ((canvas_y * scale_y) as usize).min(out_height - 1);
            for &column in &column_index {
                let value = normalize(tensor[[0, 0, row, column]]);
                data.push((value * 255.0).round().clamp(0.0, 255.0) as u8);
            }
        }

        Ok(SegmentationMask::new(
            data,
            (letterbox.source_width, letterbox.source_height),
        ))
    }
}
