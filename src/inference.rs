//! Inference backend abstraction and the shared parsing engine

use crate::{
    config::ParserConfig,
    error::{Result, WardrobeError},
    models::{DatasetConfig, ModelInfo, PreprocessingConfig},
    utils::{remap::resize_bilinear_align_corners, validation::TensorValidator},
};
use instant::Duration;
use log::debug;
use ndarray::{Array3, Array4};
use std::sync::Mutex;

/// Trait for inference backends
///
/// A backend runs the exported parsing network as an opaque function from one
/// NCHW input tensor to every NCHW output head the network produces.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    /// - Invalid configuration parameters
    fn initialize(&mut self, config: &ParserConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor, returning all output heads in
    /// network output order
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion or processing errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>>;

    /// Get the expected input shape for this backend
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Pick the parsing head out of the network outputs.
///
/// Only heads with `num_classes` channels qualify (edge heads are skipped).
/// The head with the largest spatial area wins; on a tie the later head wins,
/// which selects the fused output over the plain parsing output.
///
/// # Errors
/// - No output head has `num_classes` channels
pub fn select_parsing_head(heads: Vec<Array4<f32>>, num_classes: usize) -> Result<Array4<f32>> {
    let shapes: Vec<_> = heads.iter().map(|h| h.dim()).collect();
    let mut best: Option<(usize, Array4<f32>)> = None;

    for head in heads {
        let (_, channels, height, width) = head.dim();
        if channels != num_classes {
            continue;
        }
        let area = height * width;
        if best.as_ref().map_or(true, |(best_area, _)| area >= *best_area) {
            best = Some((area, head));
        }
    }

    best.map(|(_, head)| head).ok_or_else(|| {
        WardrobeError::inference(format!(
            "No output head has {} classes (got {:?})",
            num_classes, shapes
        ))
    })
}

/// The process-wide inference engine.
///
/// The backend is initialized once at construction. Calls are serialized
/// behind a mutex, so one engine can be shared by every request.
pub struct ParsingEngine {
    backend: Mutex<Box<dyn InferenceBackend>>,
    dataset: DatasetConfig,
    preprocessing: PreprocessingConfig,
    model_load_time: Option<Duration>,
}

impl ParsingEngine {
    /// Initialize `backend` and wrap it
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Backend frame does not match the configured dataset
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: &ParserConfig) -> Result<Self> {
        let model_load_time = backend.initialize(config)?;
        if !backend.is_initialized() {
            return Err(WardrobeError::internal(
                "Backend reported success but is not initialized",
            ));
        }

        let dataset = config.dataset.config();
        let expected = (
            1,
            3,
            dataset.input_size.0 as usize,
            dataset.input_size.1 as usize,
        );
        let actual = backend.input_shape();
        if actual != expected {
            return Err(WardrobeError::invalid_config(format!(
                "Backend expects input {:?} but the {} frame is {:?}",
                actual, dataset.dataset, expected
            )));
        }

        let preprocessing = backend.get_preprocessing_config()?;

        Ok(Self {
            backend: Mutex::new(backend),
            dataset,
            preprocessing,
            model_load_time,
        })
    }

    /// Run the network and return frame-resolution logits (HWC)
    ///
    /// # Errors
    /// - Input does not match the frame shape
    /// - Backend failures
    /// - No usable parsing head
    pub fn infer(&self, input: &Array4<f32>) -> Result<Array3<f32>> {
        let (frame_h, frame_w) = (
            self.dataset.input_size.0 as usize,
            self.dataset.input_size.1 as usize,
        );
        TensorValidator::validate_tensor_shape(input, (1, 3, frame_h, frame_w))?;

        let heads = {
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| WardrobeError::internal("Inference backend lock poisoned"))?;
            backend.infer(input)?
        };

        debug!(
            "Network produced {} head(s): {:?}",
            heads.len(),
            heads.iter().map(|h| h.dim()).collect::<Vec<_>>()
        );

        let head = select_parsing_head(heads, self.dataset.num_classes)?;
        TensorValidator::validate_output_head(&head)?;
        TensorValidator::validate_finite(&head)?;
        resize_bilinear_align_corners(&head, frame_h, frame_w)
    }

    #[must_use]
    pub fn dataset(&self) -> &DatasetConfig {
        &self.dataset
    }

    #[must_use]
    pub fn preprocessing(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    /// Time spent loading the model, if the backend reported it
    #[must_use]
    pub fn model_load_time(&self) -> Option<Duration> {
        self.model_load_time
    }

    /// Model information from the backend
    ///
    /// # Errors
    /// - Backend lock poisoned
    /// - Model metadata unavailable
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.backend
            .lock()
            .map_err(|_| WardrobeError::internal("Inference backend lock poisoned"))?
            .get_model_info()
    }
}

impl std::fmt::Debug for ParsingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingEngine")
            .field("dataset", &self.dataset.dataset)
            .field("model_load_time", &self.model_load_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::models::Dataset;

    #[test]
    fn test_select_finest_head() {
        let heads = vec![
            Array4::<f32>::zeros((1, 20, 30, 30)),
            Array4::<f32>::from_elem((1, 20, 119, 119), 1.0),
            Array4::<f32>::zeros((1, 2, 237, 237)),
        ];
        let head = select_parsing_head(heads, 20).unwrap();
        assert_eq!(head.dim(), (1, 20, 119, 119));
    }

    #[test]
    fn test_select_head_tie_prefers_later() {
        let heads = vec![
            Array4::<f32>::from_elem((1, 18, 64, 64), 1.0),
            Array4::<f32>::from_elem((1, 18, 64, 64), 2.0),
            Array4::<f32>::zeros((1, 1, 64, 64)),
        ];
        let head = select_parsing_head(heads, 18).unwrap();
        assert_eq!(head[[0, 0, 0, 0]], 2.0);
    }

    #[test]
    fn test_select_head_without_match() {
        let heads = vec![Array4::<f32>::zeros((1, 7, 8, 8))];
        let err = select_parsing_head(heads, 20).unwrap_err();
        assert!(matches!(err, WardrobeError::Inference(_)));
    }

    #[test]
    fn test_engine_produces_frame_logits() {
        let config = ParserConfig::builder().dataset(Dataset::Atr).build().unwrap();
        let backend = MockBackend::new(Dataset::Atr.config());
        let engine = ParsingEngine::new(Box::new(backend), &config).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 512, 512));
        let logits = engine.infer(&input).unwrap();
        assert_eq!(logits.dim(), (512, 512, 18));
    }

    #[test]
    fn test_engine_rejects_wrong_input() {
        let config = ParserConfig::default();
        let backend = MockBackend::new(Dataset::Lip.config());
        let engine = ParsingEngine::new(Box::new(backend), &config).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 512, 512));
        assert!(engine.infer(&input).is_err());
    }

    #[test]
    fn test_engine_rejects_mismatched_frame() {
        // ATR weights run at 512x512, LIP at 473x473
        let config = ParserConfig::builder().dataset(Dataset::Lip).build().unwrap();
        let backend = MockBackend::new(Dataset::Atr.config());
        let err = ParsingEngine::new(Box::new(backend), &config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_engine_rejects_non_finite_logits() {
        let config = ParserConfig::default();
        let backend = MockBackend::new(Dataset::Lip.config()).emitting_nan();
        let engine = ParsingEngine::new(Box::new(backend), &config).unwrap();

        let err = engine.infer(&Array4::zeros((1, 3, 473, 473))).unwrap_err();
        assert!(matches!(err, WardrobeError::Inference(_)));
    }

    #[test]
    fn test_engine_reports_model_info() {
        let config = ParserConfig::default();
        let backend = MockBackend::new(Dataset::Lip.config());
        let engine = ParsingEngine::new(Box::new(backend), &config).unwrap();

        let info = engine.model_info().unwrap();
        assert_eq!(info.dataset, Dataset::Lip);
        assert_eq!(info.input_shape, (1, 3, 473, 473));
    }

    #[test]
    fn test_engine_initialization_failure() {
        let config = ParserConfig::default();
        let backend = MockBackend::new(Dataset::Lip.config()).failing_init();
        assert!(ParsingEngine::new(Box::new(backend), &config).is_err());
    }
}
