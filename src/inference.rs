//! Segmentation backend abstraction

use crate::{
    config::EditorConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// Trait for foreground segmentation backends
///
/// A backend receives a normalized `[1, 3, H, W]` tensor and returns a
/// `[1, 1, H, W]` map of foreground scores. Scores do not have to be in
/// 0..=1; the processor min-max normalizes them.
pub trait InferenceBackend {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time when a model was loaded, `None` when the
    /// backend was already initialized.
    ///
    /// # Errors
    /// - Model missing, unreadable or rejected by the runtime
    fn initialize(&mut self, config: &EditorConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Runtime failure or unexpected output shape
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Produced output shape (NCHW)
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Backend not initialized
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Backend not initialized
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short engine name recorded in result metadata
    fn name(&self) -> String;
}
