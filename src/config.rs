//! Configuration types for wardrobe parsing
//!
//! Configuration is resolved once at process start, either through the
//! builder or from the `SCHP_*` environment variables, and is immutable for
//! the lifetime of the service.

use crate::{
    error::{Result, WardrobeError},
    models::Dataset,
    processor::BackendType,
    utils::aggregate::MinPixelRule,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable selecting the dataset preset
pub const ENV_DATASET: &str = "SCHP_DATASET";
/// Environment variable pointing at the exported weight file
pub const ENV_CHECKPOINT: &str = "SCHP_CKPT";
/// Environment variable forcing an execution device
pub const ENV_DEVICE: &str = "SCHP_DEVICE";
/// Environment variable selecting the inference backend
pub const ENV_BACKEND: &str = "SCHP_BACKEND";

/// Default upload limit for the HTTP surface (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Default decoded-image budget (4096 x 4096 pixels)
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 4096 * 4096;

/// Execution provider options for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (`CoreML` > CUDA > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration, requested as `mps` or `coreml`
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = WardrobeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "mps" | "coreml" => Ok(Self::CoreMl),
            other => Err(WardrobeError::invalid_config(format!(
                "Unknown device '{}'. Supported: auto, cpu, cuda, mps (coreml)",
                other
            ))),
        }
    }
}

/// Configuration for the parsing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Dataset preset the weights were trained on
    pub dataset: Dataset,

    /// Exported parsing network (ONNX)
    pub weights_path: PathBuf,

    /// Inference backend
    pub backend_type: BackendType,

    /// Execution provider for the backend
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Minimum pixel count for a class to contribute to an item
    pub min_pixels: MinPixelRule,

    /// Padding around each cutout's bounding box, in pixels
    pub cutout_padding: u32,

    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,

    /// Largest accepted image, in pixels; checked before full decode
    pub max_image_pixels: u64,

    /// Log per-item classes, areas and stage timings for every request
    pub debug: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        let dataset = Dataset::default();
        Self {
            dataset,
            weights_path: default_weights_path(dataset),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            min_pixels: MinPixelRule::default(),
            cutout_padding: 12,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            debug: false,
        }
    }
}

/// Conventional weight file location for a dataset (`checkpoints/<dataset>.onnx`)
#[must_use]
pub fn default_weights_path(dataset: Dataset) -> PathBuf {
    PathBuf::from("checkpoints").join(format!("{}.onnx", dataset.name()))
}

impl ParserConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use wardrobe_parse::{Dataset, ExecutionProvider, ParserConfig};
    ///
    /// let config = ParserConfig::builder()
    ///     .dataset(Dataset::Atr)
    ///     .weights_path("checkpoints/atr.onnx")
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.cutout_padding, 12);
    /// ```
    #[must_use]
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    /// Read the configuration from the process environment
    ///
    /// # Errors
    /// - Unknown dataset, device or backend names
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset. When no checkpoint is given, the
    /// conventional path for the selected dataset is used.
    ///
    /// # Errors
    /// - Unknown dataset, device or backend names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut builder = Self::builder();

        let dataset = match get(ENV_DATASET) {
            Some(value) => value.parse::<Dataset>()?,
            None => Dataset::default(),
        };
        builder = builder.dataset(dataset);

        builder = match get(ENV_CHECKPOINT) {
            Some(path) => builder.weights_path(path),
            None => builder.weights_path(default_weights_path(dataset)),
        };

        if let Some(device) = get(ENV_DEVICE) {
            builder = builder.execution_provider(device.parse()?);
        }

        if let Some(backend) = get(ENV_BACKEND) {
            builder = builder.backend_type(backend.parse()?);
        }

        builder.build()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Minimum pixel ratio outside 0.0-1.0
    /// - Zero upload limit
    /// - Zero image pixel budget
    /// - Cutout padding above 1024 px
    /// - GPU execution provider requested for the CPU-only tract backend
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_pixels.ratio) {
            return Err(WardrobeError::config_value_error(
                "min pixel ratio",
                self.min_pixels.ratio,
                "0.0-1.0",
                Some(MinPixelRule::default().ratio),
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(WardrobeError::config_value_error(
                "upload limit",
                self.max_upload_bytes,
                "> 0",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }

        if self.max_image_pixels == 0 {
            return Err(WardrobeError::config_value_error(
                "image pixel budget",
                self.max_image_pixels,
                "> 0",
                Some(DEFAULT_MAX_IMAGE_PIXELS),
            ));
        }

        if self.cutout_padding > 1024 {
            return Err(WardrobeError::config_value_error(
                "cutout padding",
                self.cutout_padding,
                "0-1024",
                Some(12),
            ));
        }

        if self.backend_type == BackendType::Tract
            && matches!(
                self.execution_provider,
                ExecutionProvider::Cuda | ExecutionProvider::CoreMl
            )
        {
            return Err(WardrobeError::invalid_config(format!(
                "Tract backend only supports CPU execution, got device '{}'",
                self.execution_provider
            )));
        }

        Ok(())
    }
}

/// Builder for `ParserConfig`
#[derive(Debug, Default)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    /// Set the dataset preset
    #[must_use]
    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.config.dataset = dataset;
        self
    }

    /// Set the weight file path
    #[must_use]
    pub fn weights_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.weights_path = path.into();
        self
    }

    /// Set the inference backend
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both thread counts: `threads` intra-op and half as many inter-op
    /// (minimum 1). Zero leaves both on auto-detect.
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Set the minimum pixel rule
    #[must_use]
    pub fn min_pixels(mut self, rule: MinPixelRule) -> Self {
        self.config.min_pixels = rule;
        self
    }

    /// Set cutout padding
    #[must_use]
    pub fn cutout_padding(mut self, padding: u32) -> Self {
        self.config.cutout_padding = padding;
        self
    }

    /// Set the upload size limit
    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Set the decoded-image pixel budget
    #[must_use]
    pub fn max_image_pixels(mut self, pixels: u64) -> Self {
        self.config.max_image_pixels = pixels;
        self
    }

    /// Enable per-request debug logging
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`ParserConfig::validate`]
    pub fn build(self) -> Result<ParserConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
