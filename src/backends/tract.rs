//! Tract backend for segmentation models
//!
//! Pure Rust ONNX inference with no native dependencies. CPU only.

use crate::config::EditorConfig;
use crate::error::{PhotoEditError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the optimized, runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
}

impl TractBackend {
    /// List Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cpu_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        log::debug!(
            "Tract on {os}/{arch}, {cpu_count} CPU cores",
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH
        );

        vec![(
            "cpu".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
        }
    }

    fn load_model(&mut self, config: &EditorConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        if self.model_manager.is_none() {
            self.model_manager = Some(ModelManager::from_spec(&config.model_spec)?);
        }
        let Some(model_manager) = self.model_manager.as_ref() else {
            return Err(PhotoEditError::model("No model manager available for Tract backend"));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let (_, channels, height, width) = model_info.input_shape;

        log::info!(
            "Initializing Tract backend with {} ({:.2} MB)",
            model_info.name,
            model_info.size_bytes as f64 / (1024.0 * 1024.0)
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| PhotoEditError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, channels, height, width]).into())
            .map_err(|e| PhotoEditError::model(format!("Failed to set model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| PhotoEditError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| PhotoEditError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!("Tract backend initialized in {}ms", model_load_time.as_millis());
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &EditorConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PhotoEditError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| PhotoEditError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| PhotoEditError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            PhotoEditError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let &[batch, channels, height, width] = output_data.shape() else {
            return Err(PhotoEditError::inference(format!(
                "Expected 4D output tensor, got shape {:?}",
                output_data.shape()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_data.iter().copied().collect(),
        )
        .map_err(|e| PhotoEditError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );

        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 320, 320), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 1, 320, 320), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| PhotoEditError::internal("Model manager not initialized"))?
            .get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| PhotoEditError::internal("Model manager not initialized"))?
            .get_info()
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> String {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or_else(|| "tract".to_string(), |info| format!("tract:{}", info.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelSpec;

    #[test]
    fn test_tract_backend_creation() {
        let backend = TractBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 320, 320));
        assert_eq!(backend.output_shape(), (1, 1, 320, 320));
        assert!(backend.get_model_info().is_err());
        assert!(backend.get_preprocessing_config().is_err());
        assert_eq!(backend.name(), "tract");
    }

    #[test]
    fn test_initialize_without_model_fails() {
        let mut backend = TractBackend::new();
        let config = EditorConfig::default();

        let err = backend.initialize(&config).unwrap_err();
        assert!(matches!(err, PhotoEditError::Model(_)));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_initialize_with_invalid_model_bytes_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"this is not a protobuf").unwrap();

        let config = EditorConfig::builder()
            .model_spec(ModelSpec::from_path(&path))
            .build()
            .unwrap();
        let mut backend = TractBackend::new();

        assert!(backend.initialize(&config).is_err());
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_requires_initialization() {
        let mut backend = TractBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(matches!(
            backend.infer(&input),
            Err(PhotoEditError::Inference(_))
        ));
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert!(providers[0].1);
    }
}
