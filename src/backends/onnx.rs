//! ONNX Runtime backend for segmentation models
//!
//! Native ONNX Runtime through `ort`, with optional CUDA acceleration.

use crate::config::{EditorConfig, ExecutionProvider};
use crate::error::{PhotoEditError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider as OrtExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        log::debug!("CUDA execution provider available: {cuda_available}");

        vec![
            (
                "auto".to_string(),
                true,
                "CUDA when available, otherwise CPU".to_string(),
            ),
            (
                "cpu".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "cuda".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
        ]
    }

    /// Create a new uninitialized ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ONNX backend with a specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
        }
    }

    fn configure_providers(builder: SessionBuilder, provider: ExecutionProvider) -> Result<SessionBuilder> {
        let cuda = CUDAExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);

        match provider {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Ok(builder)
            },
            ExecutionProvider::Auto | ExecutionProvider::Cuda if cuda_available => {
                log::info!("Using CUDA execution provider");
                builder
                    .with_execution_providers([cuda.build()])
                    .map_err(|e| {
                        PhotoEditError::inference(format!("Failed to set CUDA execution provider: {e}"))
                    })
            },
            ExecutionProvider::Cuda => {
                log::warn!("CUDA execution provider requested but not available, falling back to CPU");
                Ok(builder)
            },
            ExecutionProvider::Auto => {
                log::info!("No hardware acceleration available, using CPU");
                Ok(builder)
            },
        }
    }

    fn load_model(&mut self, config: &EditorConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        if self.model_manager.is_none() {
            self.model_manager = Some(ModelManager::from_spec(&config.model_spec)?);
        }
        let Some(model_manager) = self.model_manager.as_ref() else {
            return Err(PhotoEditError::model("No model manager available for ONNX backend"));
        };
        let model_data = model_manager.load_model()?;

        let session_builder = Session::builder()
            .map_err(|e| PhotoEditError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PhotoEditError::inference(format!("Failed to set optimization level: {e}")))?;
        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| PhotoEditError::inference(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| PhotoEditError::model(format!("Failed to create session from model data: {e}")))?;

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "ONNX Runtime backend initialized in {}ms ({intra_threads} intra-op threads)",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &EditorConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PhotoEditError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Running ONNX inference on {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| PhotoEditError::inference(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PhotoEditError::inference(format!("ONNX inference failed: {e}")))?;

        if outputs.len() == 0 {
            return Err(PhotoEditError::inference("No output tensors found"));
        }
        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| PhotoEditError::inference(format!("Failed to extract output tensor: {e}")))?;

        let &[batch, channels, height, width] = output_tensor.shape() else {
            return Err(PhotoEditError::inference(format!(
                "Expected 4D output tensor, got shape {:?}",
                output_tensor.shape()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_tensor.iter().copied().collect(),
        )
        .map_err(|e| PhotoEditError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "ONNX inference completed in {}ms",
            inference_start.elapsed().as_millis()
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
        self.session.is_some()
    }

    fn name(&self) -> String {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or_else(|| "onnx".to_string(), |info| format!("onnx:{}", info.name))
    }
}
