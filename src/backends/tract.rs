//! Tract backend for the parsing network
//!
//! Pure Rust inference with no native dependencies. The ONNX protobuf is
//! loaded and its tensor names normalized before the graph is built, so
//! weights exported from data-parallel training load the same as plain ones.

use crate::config::ParserConfig;
use crate::error::{Result, WardrobeError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use crate::utils::validation::weights::{normalize_name, ParameterReport};
use log;
use ndarray::Array4;
use tract_onnx::pb::{GraphProto, ModelProto};
use tract_onnx::prelude::*;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running the parsing network using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// List all Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Load, normalize and optimize the network
    fn load_model(&mut self, config: &ParserConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(WardrobeError::model(
                "No model manager available for Tract backend",
            ));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let (_, _, frame_h, frame_w) = model_info.input_shape;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {} ({})", model_info.name, model_info.dataset);
        log::info!("📦 Backend: Tract (Pure Rust)");
        log::info!("⚡ Execution Provider: CPU (Pure Rust)");
        if config.intra_threads > 0 || config.inter_threads > 0 {
            log::debug!("Thread settings are ignored by the Tract backend");
        }

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let framework = onnx();
        let mut proto = framework
            .proto_model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| {
                WardrobeError::model_error_with_context(
                    "parse",
                    model_manager.weights_path(),
                    &e.to_string(),
                    &["check that the file is an ONNX export of the parsing network"],
                )
            })?;

        normalize_model_names(&mut proto).log();

        let model = framework
            .model_for_proto_model(&proto)
            .map_err(|e| WardrobeError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, frame_h, frame_w]).into())
            .map_err(|e| WardrobeError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| WardrobeError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| WardrobeError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {:.2}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

/// Strip the data-parallel prefix from every tensor name in the graph and
/// report parameters that do not line up with the graph's consumers.
pub(crate) fn normalize_model_names(proto: &mut ModelProto) -> ParameterReport {
    match proto.graph.as_mut() {
        Some(graph) => normalize_graph_names(graph),
        None => ParameterReport::default(),
    }
}

fn normalize_graph_names(graph: &mut GraphProto) -> ParameterReport {
    let mut renamed = 0usize;

    for initializer in &mut graph.initializer {
        renamed += usize::from(normalize_name(&mut initializer.name));
    }
    for value in graph
        .input
        .iter_mut()
        .chain(graph.output.iter_mut())
        .chain(graph.value_info.iter_mut())
    {
        renamed += usize::from(normalize_name(&mut value.name));
    }
    for node in &mut graph.node {
        for name in node.input.iter_mut().chain(node.output.iter_mut()) {
            renamed += usize::from(normalize_name(name));
        }
    }

    graph_report(graph).with_renamed(renamed)
}

/// Parse an ONNX export and match its parameters against the graph, leaving
/// every name as stored.
///
/// # Errors
/// - Bytes are not an ONNX protobuf
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub(crate) fn parameter_report(model_data: &[u8]) -> Result<ParameterReport> {
    let proto = onnx()
        .proto_model_for_read(&mut std::io::Cursor::new(model_data))
        .map_err(|e| WardrobeError::model(format!("Failed to parse ONNX protobuf: {e}")))?;
    Ok(proto
        .graph
        .as_ref()
        .map_or_else(ParameterReport::default, graph_report))
}

fn graph_report(graph: &GraphProto) -> ParameterReport {
    ParameterReport::analyze(
        graph.initializer.iter().map(|t| t.name.as_str()),
        graph.input.iter().map(|v| v.name.as_str()),
        graph.node.iter().flat_map(|n| n.input.iter().map(String::as_str)),
        graph.node.iter().flat_map(|n| n.output.iter().map(String::as_str)),
    )
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &ParserConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| WardrobeError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference");
        log::debug!("  - Input tensor: {:?}", input.shape());

        let inference_start = Instant::now();

        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| WardrobeError::processing("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape::<f32>(input.shape(), data)
            .map_err(|e| WardrobeError::processing(format!("Failed to convert input tensor: {e}")))?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| WardrobeError::inference(format!("Tract inference failed: {e}")))?;

        let mut heads = Vec::with_capacity(outputs.len());
        for (index, value) in outputs.into_iter().enumerate() {
            let tensor = value.into_tensor();
            let shape = tensor.shape().to_vec();
            let [batch, channels, height, width] = shape[..] else {
                log::debug!("  - Skipping output {index}: {}D tensor", shape.len());
                continue;
            };

            let values = tensor
                .as_slice::<f32>()
                .map_err(|e| WardrobeError::inference(format!("Failed to read output {index}: {e}")))?
                .to_vec();
            let head = Array4::from_shape_vec((batch, channels, height, width), values).map_err(
                |e| WardrobeError::inference(format!("Failed to reshape output {index}: {e}")),
            )?;
            heads.push(head);
        }

        log::debug!(
            "✅ Tract inference completed in {:.2}ms ({} head(s))",
            inference_start.elapsed().as_millis(),
            heads.len()
        );

        Ok(heads)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
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
}
