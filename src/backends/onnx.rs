//! ONNX Runtime backend for the parsing network
//!
//! Runs the exported network with ONNX Runtime. Hardware acceleration is
//! selected from the configured [`ExecutionProvider`]; `auto` prefers CoreML,
//! then CUDA, then falls back to CPU. Requested providers that are not
//! available fall back to CPU with a warning.
//!
//! Tensor names are passed to ONNX Runtime as stored. When the `tract`
//! feature is also enabled, the protobuf is parsed once more at load time to
//! log a parameter report (missing and unexpected weights); without it no
//! report is produced.

use crate::config::{ExecutionProvider, ParserConfig};
use crate::error::{Result, WardrobeError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use log;
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::{self, value::Value};

/// ONNX Runtime backend for running the parsing network
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    ///
    /// # Examples
    /// ```rust
    /// use wardrobe_parse::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);
        log::debug!(
            "  - CPU cores: {cores}",
            cores = std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        );

        let cuda = cuda_available();
        let coreml = coreml_available();
        log::debug!("  - CUDA available: {cuda}");
        log::debug!("  - CoreML available: {coreml}");

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Create a new ONNX backend without a model; initialization fails until
    /// it is built through [`Self::with_model_manager`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Register execution providers for the requested device
    fn configure_providers(
        session_builder: SessionBuilder,
        requested: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let builder = match requested {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                if coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if cuda_available() {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                if providers.is_empty() {
                    log::info!("💻 No hardware acceleration available, using CPU");
                    session_builder
                } else {
                    log::info!(
                        "✅ Hardware acceleration enabled with {count} provider(s)",
                        count = providers.len()
                    );
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            WardrobeError::inference(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([CUDAExecutionProvider::default().build()])
                        .map_err(|e| {
                            WardrobeError::inference(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            WardrobeError::inference(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
        };

        Ok(builder)
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &ParserConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_manager = self.model_manager.as_ref().ok_or_else(|| {
            WardrobeError::model("No model manager available for ONNX backend")
        })?;

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        #[cfg(feature = "tract")]
        match crate::backends::tract::parameter_report(&model_data) {
            Ok(report) => report.log(),
            Err(e) => log::debug!("No parameter report: {e}"),
        }

        let session_builder = Session::builder()
            .map_err(|e| {
                WardrobeError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                WardrobeError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };

        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| WardrobeError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| WardrobeError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| WardrobeError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                WardrobeError::model_error_with_context(
                    "load",
                    model_manager.weights_path(),
                    &e.to_string(),
                    &["check that the file is an ONNX export of the parsing network"],
                )
            })?;

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("Session configuration:");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::debug!("  - Model: {} ({})", model_info.name, model_info.dataset);
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &ParserConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        if !self.initialized {
            return Err(WardrobeError::inference("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| WardrobeError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            WardrobeError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| WardrobeError::inference(format!("ONNX inference failed: {e}")))?;

        let core_inference_time = inference_start.elapsed();
        log::debug!(
            "  ⚡ Core inference: {:.2}ms",
            core_inference_time.as_secs_f64() * 1000.0
        );

        let keys: Vec<String> = outputs.keys().map(ToString::to_string).collect();
        if keys.is_empty() {
            return Err(WardrobeError::inference("No output tensors found"));
        }

        let mut heads = Vec::with_capacity(keys.len());
        for key in &keys {
            let view = outputs
                .get(key.as_str())
                .ok_or_else(|| WardrobeError::inference(format!("Output '{key}' not found")))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    WardrobeError::inference(format!("Failed to extract output '{key}': {e}"))
                })?;

            if view.ndim() != 4 {
                log::debug!("  - Skipping output '{key}': {}D tensor", view.ndim());
                continue;
            }

            let head = view
                .to_owned()
                .into_dimensionality::<Ix4>()
                .map_err(|e| {
                    WardrobeError::inference(format!("Failed to reshape output '{key}': {e}"))
                })?;
            log::debug!("  📋 Output '{key}': {:?}", head.dim());
            heads.push(head);
        }

        log::debug!(
            "📊 Inference complete: {:.2}ms total, {} head(s)",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            heads.len()
        );

        Ok(heads)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 473, 473), |info| info.input_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| WardrobeError::internal("Model manager not initialized"))?;
        Ok(model_manager.get_preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| WardrobeError::internal("Model manager not initialized"))?;
        model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
