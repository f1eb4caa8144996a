//! Segmentation backend selection strings
//!
//! The CLI and config accept `backend[:provider]` strings such as
//! `tract`, `tract:cpu`, `onnx:cuda` or `mock`.

use crate::{
    config::ExecutionProvider,
    error::{PhotoEditError, Result},
    processor::BackendType,
};

/// Information about a backend/provider combination
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse a `backend[:provider]` string
    ///
    /// # Examples
    /// ```rust
    /// use magic_photo::{utils::ExecutionProviderManager, BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda").unwrap();
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::Cuda);
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or a provider the backend does not support
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };
        let backend_type: BackendType = backend.parse()?;

        let execution_provider = match (backend_type, provider) {
            (_, None) => Self::default_provider_for_backend(backend_type),
            (BackendType::Onnx, Some("auto")) => ExecutionProvider::Auto,
            (BackendType::Onnx, Some("cuda")) => ExecutionProvider::Cuda,
            (_, Some("cpu")) => ExecutionProvider::Cpu,
            (BackendType::Onnx, Some(other)) => {
                return Err(PhotoEditError::invalid_config(format!(
                    "Unknown ONNX provider: {other}. Supported: auto, cpu, cuda"
                )));
            },
            (backend_type, Some(other)) => {
                return Err(PhotoEditError::invalid_config(format!(
                    "Unknown {backend_type} provider: {other}. Only 'cpu' is supported"
                )));
            },
        };

        Ok((backend_type, execution_provider))
    }

    /// Validate a provider string without keeping the parse result
    #[must_use]
    pub fn is_valid_provider_string(provider_str: &str) -> bool {
        Self::parse_provider_string(provider_str).is_ok()
    }

    /// Get the default provider for a given backend type
    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract | BackendType::Mock => ExecutionProvider::Cpu,
        }
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{backend_type}:{provider}")
    }

    /// All combinations with availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx = crate::backends::OnnxBackend::list_providers();
        #[cfg(not(feature = "onnx"))]
        let onnx: Vec<(String, bool, String)> = ["auto", "cpu", "cuda"]
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    false,
                    "ONNX Runtime (feature disabled)".to_string(),
                )
            })
            .collect();

        for (name, available, description) in onnx {
            if let Ok((backend_type, execution_provider)) =
                Self::parse_provider_string(&format!("onnx:{name}"))
            {
                providers.push(ProviderInfo {
                    name: format!("onnx:{name}"),
                    backend_type,
                    execution_provider,
                    available,
                    description,
                });
            }
        }

        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: "Pure Rust CPU inference via Tract".to_string(),
        });

        providers.push(ProviderInfo {
            name: "mock:cpu".to_string(),
            backend_type: BackendType::Mock,
            execution_provider: ExecutionProvider::Cpu,
            available: true,
            description: "Synthetic center-weighted mask, no model required".to_string(),
        });

        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onnx_providers() {
        for (input, expected) in [
            ("onnx:auto", ExecutionProvider::Auto),
            ("onnx:cpu", ExecutionProvider::Cpu),
            ("onnx:cuda", ExecutionProvider::Cuda),
            ("onnx", ExecutionProvider::Auto),
        ] {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected, "{input}");
        }
    }

    #[test]
    fn test_parse_cpu_only_backends() {
        let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract").unwrap();
        assert_eq!((backend, provider), (BackendType::Tract, ExecutionProvider::Cpu));

        let (backend, _) = ExecutionProviderManager::parse_provider_string("mock:cpu").unwrap();
        assert_eq!(backend, BackendType::Mock);

        assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("mock:auto").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(!ExecutionProviderManager::is_valid_provider_string("invalid"));
        assert!(!ExecutionProviderManager::is_valid_provider_string("onnx:invalid"));
        assert!(!ExecutionProviderManager::is_valid_provider_string("invalid:auto"));
    }

    #[test]
    fn test_provider_to_string() {
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Onnx, ExecutionProvider::Auto),
            "onnx:auto"
        );
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            "tract:cpu"
        );
    }

    #[test]
    fn test_list_all_providers() {
        let providers = ExecutionProviderManager::list_all_providers();
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"onnx:auto"));
        assert!(names.contains(&"tract:cpu"));
        assert!(providers.iter().any(|p| p.name == "mock:cpu" && p.available));
    }
}
