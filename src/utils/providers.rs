//! Backend and execution provider parsing
//!
//! Devices are requested either as a bare device (`SCHP_DEVICE=cuda`) or as a
//! combined `backend:device` string (`onnx:mps`, `tract:cpu`).

use crate::{
    config::ExecutionProvider,
    error::{Result, WardrobeError},
    processor::BackendType,
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and managing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in format `backend[:device]`
    ///
    /// # Examples
    /// ```rust
    /// use wardrobe_parse::utils::ExecutionProviderManager;
    /// use wardrobe_parse::{BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:mps").unwrap();
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::CoreMl);
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or device
    /// - GPU device requested for the tract backend
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, device) = match provider_str.split_once(':') {
            Some((backend, device)) => (backend, Some(device)),
            None => (provider_str, None),
        };

        let backend_type: BackendType = backend.parse()?;
        let execution_provider = match device {
            Some(device) => device.parse()?,
            None => Self::default_provider_for_backend(backend_type),
        };

        if backend_type == BackendType::Tract
            && matches!(
                execution_provider,
                ExecutionProvider::Cuda | ExecutionProvider::CoreMl
            )
        {
            return Err(WardrobeError::invalid_config(format!(
                "Unknown Tract provider: {}. Tract only supports 'cpu'",
                execution_provider
            )));
        }

        Ok((backend_type, execution_provider))
    }

    /// Get a list of all provider combinations with availability status
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx: Vec<(String, bool, String)> = crate::backends::OnnxBackend::list_providers();
        #[cfg(not(feature = "onnx"))]
        let onnx: Vec<(String, bool, String)> = Vec::new();

        let onnx_available = |name: &str| {
            onnx.iter()
                .any(|(provider, available, _)| provider.eq_ignore_ascii_case(name) && *available)
        };

        for (provider, description) in [
            (ExecutionProvider::Auto, "ONNX Runtime, CoreML > CUDA > CPU"),
            (ExecutionProvider::Cpu, "ONNX Runtime CPU execution"),
            (ExecutionProvider::Cuda, "ONNX Runtime CUDA GPU acceleration"),
            (ExecutionProvider::CoreMl, "ONNX Runtime CoreML (Apple Silicon) acceleration"),
        ] {
            let available = match provider {
                ExecutionProvider::Auto => onnx_available("cpu"),
                other => onnx_available(&other.to_string()),
            };
            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Onnx, provider),
                backend_type: BackendType::Onnx,
                execution_provider: provider,
                available,
                description: description.to_string(),
            });
        }

        providers.push(ProviderInfo {
            name: Self::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: "Pure Rust CPU inference via Tract".to_string(),
        });

        providers
    }

    /// Get the default provider for a given backend type
    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract => ExecutionProvider::Cpu,
        }
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{}:{}", backend_type, provider)
    }
}
