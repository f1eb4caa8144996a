//! Mock segmentation backend for tests and model-free runs

use crate::config::EditorConfig;
use crate::error::{PhotoEditError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, PreprocessingConfig};
use instant::Duration;
use ndarray::Array4;

/// Normalized radius inside which the mock mask is fully foreground
const CORE_RADIUS: f32 = 0.3;
/// Normalized radius beyond which the mock mask is fully background
const EDGE_RADIUS: f32 = 0.4;

/// Mock backend producing a soft, center-weighted ellipse as the foreground
///
/// Stands in for a salient object model on centered subjects. No model file
/// is needed.
#[derive(Debug)]
pub struct MockBackend {
    preprocessing: PreprocessingConfig,
    failure: Option<String>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            preprocessing: PreprocessingConfig::default(),
            failure: None,
        }
    }

    /// A backend whose inference always fails with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    fn shape(&self, channels: usize) -> (usize, usize, usize, usize) {
        let [width, height] = self.preprocessing.target_size;
        (1, channels, height as usize, width as usize)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, config: &EditorConfig) -> Result<Option<Duration>> {
        self.preprocessing = config.model_spec.preprocessing.clone();
        Ok(None)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if let Some(message) = &self.failure {
            return Err(PhotoEditError::inference(message.clone()));
        }

        let (n, _c, h, w) = input.dim();
        let mut output = Array4::<f32>::zeros((n, 1, h, w));
        let (center_x, center_y) = (w as f32 / 2.0, h as f32 / 2.0);

        for ((_, _, y, x), value) in output.indexed_iter_mut() {
            let dx = (x as f32 + 0.5 - center_x) / w as f32;
            let dy = (y as f32 + 0.5 - center_y) / h as f32;
            let distance = dx.hypot(dy);
            *value = ((EDGE_RADIUS - distance) / (EDGE_RADIUS - CORE_RADIUS)).clamp(0.0, 1.0);
        }

        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.shape(3)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.shape(1)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_mask_is_center_weighted() {
        let mut backend = MockBackend::new();
        let output = backend.infer(&Array4::zeros((1, 3, 100, 100))).unwrap();

        assert_eq!(output.dim(), (1, 1, 100, 100));
        assert_eq!(output[[0, 0, 50, 50]], 1.0);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
        let edge = output[[0, 0, 50, 85]];
        assert!(edge > 0.0 && edge < 1.0, "soft edge value {edge}");
    }

    #[test]
    fn test_mock_follows_configured_preprocessing() {
        let mut backend = MockBackend::new();
        let mut config = EditorConfig::default();
        config.model_spec.preprocessing.target_size = [64, 48];

        assert!(backend.initialize(&config).unwrap().is_none());
        assert_eq!(backend.input_shape(), (1, 3, 48, 64));
        assert_eq!(backend.get_preprocessing_config().unwrap().target_size, [64, 48]);
    }

    #[test]
    fn test_failing_mock() {
        let mut backend = MockBackend::failing("simulated outage");
        let err = backend.infer(&Array4::zeros((1, 3, 4, 4))).unwrap_err();
        assert_eq!(err.to_string(), "Inference error: simulated outage");
    }
}
