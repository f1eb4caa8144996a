//! Segmentation model specification and loading

use crate::error::{PhotoEditError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up when a model path points at a directory
pub const MODEL_FILE_NAME: &str = "model.onnx";

/// Input preparation parameters for a segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square model input, `[width, height]`
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to 0..=1
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided by after mean subtraction
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    /// U2-Net style salient object detection input: 320x320, `ImageNet` statistics
    fn default() -> Self {
        Self {
            target_size: [320, 320],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

impl PreprocessingConfig {
    /// Check the target size and normalization statistics
    ///
    /// # Errors
    /// - Target size is zero or larger than 4096 in either dimension
    /// - A standard deviation is not strictly positive
    pub fn validate(&self) -> Result<()> {
        let [width, height] = self.target_size;
        if width == 0 || height == 0 || width > 4096 || height > 4096 {
            return Err(PhotoEditError::invalid_config(format!(
                "Invalid model input size {width}x{height} (valid range: 1-4096)"
            )));
        }
        if self.normalization_std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PhotoEditError::invalid_config(format!(
                "Normalization std must be positive, got {:?}",
                self.normalization_std
            )));
        }
        if self.normalization_mean.iter().any(|m| !m.is_finite()) {
            return Err(PhotoEditError::invalid_config(format!(
                "Normalization mean must be finite, got {:?}",
                self.normalization_mean
            )));
        }
        Ok(())
    }
}

/// Where the segmentation model lives and how to feed it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// ONNX file, or a directory holding `model.onnx`
    pub path: Option<PathBuf>,
    pub preprocessing: PreprocessingConfig,
}

impl ModelSpec {
    /// Spec for a model file with the default preprocessing
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            preprocessing: PreprocessingConfig::default(),
        }
    }

    /// Short name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => "unset".to_string(),
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW
    pub output_shape: (usize, usize, usize, usize),
}

/// Model provider trait for loading models
pub trait ModelProvider: std::fmt::Debug {
    /// Load model data as bytes
    ///
    /// # Errors
    /// - Model file not found or inaccessible
    fn load_model_data(&self) -> Result<Vec<u8>>;

    /// Get model information
    ///
    /// # Errors
    /// - Model metadata cannot be determined
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// - Preprocessing parameters are invalid
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get the model file path
    ///
    /// # Errors
    /// - Model path not available for this provider type
    fn get_model_path(&self) -> Result<PathBuf>;
}

/// Provider for an ONNX file on the local filesystem
#[derive(Debug)]
pub struct FileModelProvider {
    model_file: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl FileModelProvider {
    /// Resolve a file or directory path to the model file
    ///
    /// # Errors
    /// - Path does not exist
    /// - Directory without a `model.onnx` inside
    /// - Invalid preprocessing parameters
    pub fn new<P: AsRef<Path>>(path: P, preprocessing: PreprocessingConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PhotoEditError::model(format!(
                "Model path does not exist: {}",
                path.display()
            )));
        }

        let model_file = if path.is_dir() {
            let candidate = path.join(MODEL_FILE_NAME);
            if !candidate.is_file() {
                return Err(PhotoEditError::model(format!(
                    "No {MODEL_FILE_NAME} found in model directory: {}",
                    path.display()
                )));
            }
            candidate
        } else {
            path.to_path_buf()
        };

        preprocessing.validate()?;

        Ok(Self {
            model_file,
            preprocessing,
        })
    }
}

impl ModelProvider for FileModelProvider {
    fn load_model_data(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.model_file)
            .map_err(|e| PhotoEditError::file_io_error("read model file", &self.model_file, &e))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let size_bytes = std::fs::metadata(&self.model_file)
            .map_err(|e| PhotoEditError::file_io_error("stat model file", &self.model_file, &e))?
            .len() as usize;
        let [width, height] = self.preprocessing.target_size;
        let (width, height) = (width as usize, height as usize);

        Ok(ModelInfo {
            name: self
                .model_file
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn get_model_path(&self) -> Result<PathBuf> {
        Ok(self.model_file.clone())
    }
}

/// Model manager for handling the configured model source
#[derive(Debug)]
pub struct ModelManager {
    provider: Box<dyn ModelProvider>,
}

impl ModelManager {
    /// Create a new model manager from a model specification
    ///
    /// # Errors
    /// - No model path configured
    /// - Model path does not exist or has no model file
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let path = spec.path.as_ref().ok_or_else(|| {
            PhotoEditError::model(
                "No segmentation model configured. Pass --model <PATH> or set model_spec.path in the config file",
            )
        })?;
        let provider = FileModelProvider::new(path, spec.preprocessing.clone())?;
        Ok(Self {
            provider: Box::new(provider),
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - Model file not found or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        self.provider.load_model_data()
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        self.provider.get_model_info()
    }

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// - Provider cannot supply preprocessing parameters
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.provider.get_preprocessing_config()
    }

    /// Get the model file path
    ///
    /// # Errors
    /// - Model path not available for this provider type
    pub fn get_model_path(&self) -> Result<PathBuf> {
        self.provider.get_model_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preprocessing_is_valid() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.target_size, [320, 320]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preprocessing_validation() {
        let mut config = PreprocessingConfig::default();
        config.target_size = [0, 320];
        assert!(config.validate().is_err());

        let mut config = PreprocessingConfig::default();
        config.normalization_std = [0.229, 0.0, 0.225];
        assert!(config.validate().is_err());

        let mut config = PreprocessingConfig::default();
        config.normalization_mean = [f32::NAN, 0.5, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_manager_requires_model_path() {
        let err = ModelManager::from_spec(&ModelSpec::default()).unwrap_err();
        assert!(err.to_string().contains("No segmentation model configured"));
    }

    #[test]
    fn test_nonexistent_model_path() {
        let err = ModelManager::from_spec(&ModelSpec::from_path("/nonexistent/u2net.onnx"))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_directory_without_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileModelProvider::new(dir.path(), PreprocessingConfig::default()).unwrap_err();
        assert!(err.to_string().contains(MODEL_FILE_NAME));
    }

    #[test]
    fn test_directory_model_resolution_and_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE_NAME), b"not really onnx").unwrap();

        let manager = ModelManager::from_spec(&ModelSpec::from_path(dir.path())).unwrap();
        assert_eq!(
            manager.get_model_path().unwrap(),
            dir.path().join(MODEL_FILE_NAME)
        );

        let info = manager.get_info().unwrap();
        assert_eq!(info.name, "model");
        assert_eq!(info.size_bytes, 15);
        assert_eq!(info.input_shape, (1, 3, 320, 320));
        assert_eq!(manager.load_model().unwrap(), b"not really onnx");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ModelSpec::default().display_name(), "unset");
        assert_eq!(
            ModelSpec::from_path("/models/u2net.onnx").display_name(),
            "external:u2net.onnx"
        );
    }
}
